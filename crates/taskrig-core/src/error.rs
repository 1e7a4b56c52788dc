// Error types shared by the worker runtime and the protocol client

use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that can occur while fetching, executing or reporting external tasks
#[derive(Debug, Error)]
pub enum TaskError {
    /// Invalid worker configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine answered with a non-success status code
    #[error("Unsuccessful HTTP call to '{path}'. Status code: {status}. Request: {request}. Response: '{response}'")]
    Transport {
        path: String,
        status: u16,
        request: String,
        response: String,
    },

    /// The engine could not be reached at all
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was interrupted by shutdown
    #[error("Operation cancelled")]
    Cancelled,
}

impl TaskError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TaskError::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        TaskError::Connection(msg.into())
    }

    /// Whether this error marks a shutdown-time exit that loops swallow silently
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// Whether the protocol client may retry the call that produced this error.
    /// Connectivity failures and server-side errors are retryable; client-side
    /// rejections (4xx) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskError::Connection(_) => true,
            TaskError::Transport { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
