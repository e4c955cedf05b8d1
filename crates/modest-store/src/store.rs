//! Store, transport and send-queue capabilities.
//!
//! These traits are the whole surface the mail operations consume. A store
//! implementation owns its protocol plumbing (IMAP, POP, local files); the
//! caller only sees folders, headers and messages. Methods are `async` but
//! callers are free to drive them to completion on a worker thread.

use crate::{
    FolderId, FolderInfo, FolderType, Message, MessageFlags, MessageHeader, ParentRef,
    StoreError, StoreResult,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Position / of-total progress callback used by long transfers
pub type Progress<'a> = &'a (dyn Fn(u32, u32) + Send + Sync);

/// Protocol behind a store account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Imap,
    Pop,
    /// Folders kept on the device
    Local,
}

/// Receives the headers a folder refresh discovers
pub trait FolderObserver: Send + Sync {
    /// Called once per batch of newly-arrived headers
    fn headers_added(&self, headers: &[MessageHeader]);
}

/// A store account: hierarchically organised folders holding messages
#[async_trait]
pub trait Store: Send + Sync {
    /// Account name, matching `FolderId::account` of every folder it owns
    fn name(&self) -> &str;

    fn protocol(&self) -> Protocol;

    /// Whether folders may be created at the top level of the account
    fn can_create_root_folders(&self) -> bool {
        self.protocol() != Protocol::Pop
    }

    /// All folders of the account, recursively
    async fn list_folders(&self, subscribed_only: bool) -> StoreResult<Vec<FolderInfo>>;

    /// Look up a single folder
    async fn folder(&self, id: &FolderId) -> StoreResult<FolderInfo> {
        self.list_folders(false)
            .await?
            .into_iter()
            .find(|f| &f.id == id)
            .ok_or_else(|| StoreError::FolderNotFound(id.to_string()))
    }

    /// Direct children of an account root or folder
    async fn children(&self, parent: &ParentRef) -> StoreResult<Vec<FolderInfo>> {
        let parent_folder = parent.folder().cloned();
        Ok(self
            .list_folders(false)
            .await?
            .into_iter()
            .filter(|f| f.parent == parent_folder)
            .collect())
    }

    /// Folder playing a special role (drafts, outbox, trash...) if the account has one
    async fn special_folder(&self, folder_type: FolderType) -> StoreResult<Option<FolderInfo>> {
        Ok(self
            .list_folders(false)
            .await?
            .into_iter()
            .find(|f| f.folder_type == folder_type))
    }

    async fn create_folder(&self, parent: &ParentRef, name: &str) -> StoreResult<FolderInfo>;

    async fn remove_folder(&self, id: &FolderId) -> StoreResult<()>;

    /// Copy (or move, with `delete_original`) a folder tree under `parent`
    async fn copy_folder(
        &self,
        id: &FolderId,
        parent: &ParentRef,
        new_name: &str,
        delete_original: bool,
        progress: Progress<'_>,
    ) -> StoreResult<FolderInfo>;

    /// Fetch the folder's current header list from the server, reporting
    /// new arrivals to `observer`
    async fn refresh_folder(&self, id: &FolderId, observer: &dyn FolderObserver)
        -> StoreResult<()>;

    /// Cheap status check (counts only, no header download)
    async fn poke_status(&self, id: &FolderId) -> StoreResult<FolderInfo>;

    async fn headers(&self, id: &FolderId) -> StoreResult<Vec<MessageHeader>>;

    /// Retrieve the full message, caching its body locally
    async fn get_message(&self, header: &MessageHeader) -> StoreResult<Message>;

    async fn add_message(&self, folder: &FolderId, message: Message) -> StoreResult<MessageHeader>;

    async fn remove_message(&self, header: &MessageHeader) -> StoreResult<()>;

    async fn set_flags(&self, header: &MessageHeader, flags: MessageFlags) -> StoreResult<()>;

    /// Push local changes to the server, optionally expunging deleted messages
    async fn sync_folder(&self, id: &FolderId, expunge: bool) -> StoreResult<()>;

    /// Copy (or move) messages into another folder of this store
    async fn transfer_messages(
        &self,
        headers: &[MessageHeader],
        dest: &FolderId,
        delete_original: bool,
        progress: Progress<'_>,
    ) -> StoreResult<Vec<MessageHeader>>;

    /// Best-effort request to abort whatever the account is doing
    fn cancel(&self);

    /// Drop a cancel request no call has picked up yet, so it cannot hit
    /// the next request made on this account
    fn clear_cancel(&self) {}
}

/// Outbound queue of a transport account
#[async_trait]
pub trait SendQueue: Send + Sync {
    /// Enqueue a message for delivery
    async fn add(&self, message: Message) -> StoreResult<()>;

    /// Try to deliver everything queued now
    async fn flush(&self) -> StoreResult<()>;
}

/// A transport account (SMTP and friends)
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// The account's send queue, if it could be set up
    fn send_queue(&self) -> Option<Arc<dyn SendQueue>>;
}
