pub mod close;
pub mod context;
pub mod conversation;
pub mod goals;
pub mod sessions;
pub mod stats;
pub mod summarizer;
pub mod sweep;
