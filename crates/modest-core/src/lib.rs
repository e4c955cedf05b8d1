//! Mail operations for Modest
//!
//! Asynchronous, cancellable, progress-reporting tasks over the mail store
//! interface, the queue that tracks them, and the application context they
//! run in.

mod account;
mod config;
mod context;
mod dispatch;
mod error;
mod observer;
mod operation;
pub mod ops;
mod queue;
pub mod rules;

pub use account::{Account, AccountRegistry, LOCAL_FOLDERS_ACCOUNT};
pub use config::{AccountSettings, AccountState, ConfStore, JsonConf, MailSettings, MemoryConf, RetrieveType};
pub use context::AppContext;
pub use dispatch::{IdleLoop, IdleSender};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use observer::NewHeadersObserver;
pub use operation::{
    ErrorHandler, HandlerId, MailOperation, OperationKind, OperationSource, OperationStatus,
    ProgressHandler, StateSnapshot,
};
pub use queue::{MailOperationQueue, QueueEvent};
