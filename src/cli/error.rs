//! Error types for CLI operations

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::orchestration::InitializationError;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur during CLI command execution
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Runtime could not be built or is shut down
    #[error("Initialization error: {0}")]
    InitializationError(#[from] InitializationError),

    /// Conversation store error
    #[error("Checkpoint error: {0}")]
    CheckpointError(#[from] CheckpointError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid argument or input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::ConfigError(format!("{:#}", err))
    }
}
