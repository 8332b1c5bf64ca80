use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SolaceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Access denied to {kind} {id}")]
    AccessDenied { kind: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),
}

impl SolaceError {
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "session",
            id: id.into(),
        }
    }

    /// Stable wire code carried in IPC responses and mapped to HTTP statuses.
    pub fn code(&self) -> &'static str {
        match self {
            SolaceError::NotFound { .. } => "not_found",
            SolaceError::AccessDenied { .. } => "access_denied",
            SolaceError::InvalidInput(_) => "invalid_input",
            SolaceError::Store(_) => "store_failure",
            SolaceError::Config(_) | SolaceError::Io(_) | SolaceError::Ipc(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SolaceError>;
