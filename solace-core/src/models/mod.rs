pub mod emotion;
pub mod goal;
pub mod message;
pub mod rollup;
pub mod session;
pub mod summary;

pub use emotion::{Emotion, EmotionDistribution, EmotionProfile, MessageAnalysis};
pub use goal::{Goal, GoalCandidate, GoalStatus, GoalTrackingResult};
pub use message::{transcript, Message, MessageRole};
pub use rollup::UserRollup;
pub use session::{HistoryEntry, Session, SessionState};
pub use summary::SessionSummary;
