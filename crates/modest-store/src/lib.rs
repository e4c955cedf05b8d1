//! Mail store interface for Modest
//!
//! Folder, header and message types plus the store, transport and
//! send-queue capabilities the mail operations are written against.

mod error;
mod folder;
pub mod memory;
mod message;
mod store;

pub use error::{StoreError, StoreResult};
pub use folder::{FolderId, FolderInfo, FolderRules, FolderType, ParentRef};
pub use memory::{MemorySendQueue, MemoryStore, MemoryTransport};
pub use message::{EmailAddress, HeaderId, Message, MessageFlags, MessageHeader};
pub use store::{FolderObserver, Progress, Protocol, SendQueue, Store, Transport};
