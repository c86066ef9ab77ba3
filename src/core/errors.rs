//! Error types for the council core.

use thiserror::Error;

/// Council core error type.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// An operation referenced an entity that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up (e.g. `conversation`).
        entity: &'static str,
        /// Identifier that was requested.
        id: String,
    },
    /// Rejected argument (negative count, over-completion, no active stage).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `SQLite` storage error.
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Invalid ranking pattern.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CouncilError {
    /// Build a `NotFound` error for a conversation id.
    #[must_use]
    pub fn conversation_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }
    }

    /// Build an `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether the error was caused by the caller rather than the environment.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidArgument(_))
    }
}

/// Convenience result alias for council operations.
pub type CouncilResult<T> = Result<T, CouncilError>;
