//! Operation drivers.
//!
//! Each driver is a method on [`MailOperation`](crate::MailOperation): it
//! validates on the calling thread, then runs the store work on the
//! operation's worker thread.

mod folder;
mod message;
mod send;
mod update;

pub use folder::FolderCallback;
pub use message::{
    DestroyNotify, GetMsgCallback, GetMsgsCallback, MimePartSizeCallback, RefreshCallback,
    XferMsgsCallback,
};
pub use send::{CreateMsgCallback, SaveToDraftsCallback};
pub use update::UpdateAccountCallback;

use crate::{AppContext, CoreError, CoreResult};
use modest_store::{Protocol, Store};
use std::sync::Arc;

/// Store of `account`, or item-not-found
pub(crate) fn store_for(ctx: &AppContext, account: &str) -> CoreResult<Arc<dyn Store>> {
    ctx.accounts()
        .store(account)
        .ok_or_else(|| CoreError::ItemNotFound(format!("account {}", account)))
}

/// Whether syncing a folder after removing messages also expunges them.
/// IMAP leaves the expunge to the user or to connection teardown.
pub(crate) fn expunges_on_sync(protocol: Protocol) -> bool {
    protocol != Protocol::Imap
}
