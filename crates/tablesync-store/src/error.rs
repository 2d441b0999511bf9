//! Store layer error types

use thiserror::Error;

/// Store layer errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is not initialized")]
    NotInitialized,

    #[error("local store error: {0}")]
    Local(String),

    #[error("remote service error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("not found on remote service: {table}/{id}")]
    RemoteNotFound { table: String, id: String },

    #[error("record has no id field")]
    MissingId,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("sync queue error: {0}")]
    Queue(String),
}

impl StoreError {
    /// The one recoverable remote condition: the target id does not exist
    /// remotely. A failed update with this error falls back to insert.
    #[must_use]
    pub const fn is_remote_not_found(&self) -> bool {
        matches!(self, Self::RemoteNotFound { .. })
    }

    /// Shorthand for the distinguished not-found failure signal.
    pub fn remote_not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RemoteNotFound {
            table: table.into(),
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tablesync_domain::DomainError> for StoreError {
    fn from(err: tablesync_domain::DomainError) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
