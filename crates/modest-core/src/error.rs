//! Error types for mail operations

use modest_mime::MimeError;
use modest_store::StoreError;
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Error category a caller can branch on without parsing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ItemNotFound,
    BadParameter,
    FolderRules,
    FolderExists,
    InstanceCreationFailed,
    MessageSizeLimit,
    RetrievalNumberLimit,
    OperationCanceled,
    Unclassified,
}

/// Errors that can occur in mail operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Account, folder or message does not exist
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// The caller passed arguments the operation cannot act on
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// A folder's capabilities forbid the change
    #[error("Folder rules violated: {0}")]
    FolderRules(String),

    /// A folder with the requested name already exists
    #[error("Folder already exists: {0}")]
    FolderExists(String),

    /// A helper object (send queue, worker thread...) could not be created
    #[error("Could not create {0}")]
    InstanceCreationFailed(String),

    /// Message too large to download as part of a batch
    #[error("Message size limit exceeded: {0}")]
    MessageSizeLimit(String),

    /// More new messages than the account allows to retrieve
    #[error("Retrieval limit exceeded: {0}")]
    RetrievalNumberLimit(String),

    #[error("Operation canceled")]
    OperationCanceled,

    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend error without a more specific category
    #[error("{0}")]
    Store(String),

    /// Message composition or parsing failed
    #[error("MIME error: {0}")]
    Mime(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ItemNotFound(_) => ErrorKind::ItemNotFound,
            CoreError::BadParameter(_) => ErrorKind::BadParameter,
            CoreError::FolderRules(_) => ErrorKind::FolderRules,
            CoreError::FolderExists(_) => ErrorKind::FolderExists,
            CoreError::InstanceCreationFailed(_) => ErrorKind::InstanceCreationFailed,
            CoreError::MessageSizeLimit(_) => ErrorKind::MessageSizeLimit,
            CoreError::RetrievalNumberLimit(_) => ErrorKind::RetrievalNumberLimit,
            CoreError::OperationCanceled => ErrorKind::OperationCanceled,
            CoreError::Config(_) | CoreError::Store(_) | CoreError::Mime(_) => {
                ErrorKind::Unclassified
            }
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.kind() == ErrorKind::OperationCanceled
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Canceled => CoreError::OperationCanceled,
            StoreError::FolderNotFound(what) | StoreError::MessageNotFound(what) => {
                CoreError::ItemNotFound(what)
            }
            StoreError::AlreadyExists(what) => CoreError::FolderExists(what),
            other => CoreError::Store(other.to_string()),
        }
    }
}

impl From<MimeError> for CoreError {
    fn from(e: MimeError) -> Self {
        match e {
            MimeError::PartNotFound(index) => CoreError::ItemNotFound(format!("MIME part {}", index)),
            other => CoreError::Mime(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
