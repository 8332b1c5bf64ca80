pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod ipc;
pub mod models;
pub mod scorer;
pub mod store;

pub use config::SolaceConfig;
pub use error::SolaceError;
pub use generation::{GeminiConfig, GeminiGenerationClient, GenerationError, TextGenerator};
pub use store::{Collection, DocumentStore, MemoryStore, PgDocumentStore, Query, StoreError, Update};
