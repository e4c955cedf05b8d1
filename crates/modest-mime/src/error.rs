//! Error types for message composition

use thiserror::Error;

/// Result type for MIME operations
pub type MimeResult<T> = Result<T, MimeError>;

/// Errors that can occur while building or reading a message
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MimeError {
    /// Invalid email address
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message building error
    #[error("Failed to build message: {0}")]
    MessageBuildError(String),

    /// Raw bytes are not a parseable message
    #[error("Failed to parse message: {0}")]
    ParseError(String),

    /// Requested MIME part does not exist
    #[error("MIME part not found: {0}")]
    PartNotFound(usize),
}
