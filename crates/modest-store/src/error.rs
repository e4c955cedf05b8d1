//! Error types for store operations

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a mail store or transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Folder does not exist in the store
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Message does not exist in its folder
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// A folder with that name already exists
    #[error("Folder already exists: {0}")]
    AlreadyExists(String),

    /// The store refused the request
    #[error("Operation not permitted: {0}")]
    NotPermitted(String),

    /// The store does not implement this capability
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Server or backend returned an error
    #[error("Store error: {0}")]
    Backend(String),

    /// The request was canceled before it completed
    #[error("Operation canceled")]
    Canceled,
}
