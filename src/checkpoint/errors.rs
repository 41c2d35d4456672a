//! Error types for the conversation state store

use super::backend::StorageError;
use thiserror::Error;

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors raised while loading or saving conversation checkpoints
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Checkpoint version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("Corrupted checkpoint data: {message}")]
    CorruptedData { message: String },

    #[error("Invalid conversation ID: {conversation_id}")]
    InvalidConversationId { conversation_id: String },
}

impl CheckpointError {
    /// Create a config error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a corrupted data error
    pub fn corrupted<S: Into<String>>(message: S) -> Self {
        Self::CorruptedData {
            message: message.into(),
        }
    }

    /// Whether the stored data itself is unusable (as opposed to the store
    /// being unreachable). Such checkpoints are replaced by a fresh state.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CheckpointError::Serialization(_)
                | CheckpointError::CorruptedData { .. }
                | CheckpointError::VersionMismatch { .. }
        )
    }
}
