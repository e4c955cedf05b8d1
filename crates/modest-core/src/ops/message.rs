//! Message fetch, removal, transfer and folder refresh

use super::{expunges_on_sync, store_for};
use crate::rules::FolderCapabilities;
use crate::{AppContext, CoreError, CoreResult, IdleSender, MailOperation, NewHeadersObserver, OperationStatus};
use futures::executor::block_on;
use modest_mime::attachment_size;
use modest_store::{FolderId, FolderInfo, FolderType, Message, MessageHeader, Store};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives the fetched message, `None` on failure or cancellation
pub type GetMsgCallback = Box<dyn FnOnce(&MailOperation, &MessageHeader, Option<&Message>) + Send>;

/// Receives each message of a batch fetch as it arrives
pub type GetMsgsCallback = Arc<dyn Fn(&MailOperation, &MessageHeader, &Message) + Send + Sync>;

/// Releases caller data once a batch fetch has delivered everything
pub type DestroyNotify = Box<dyn FnOnce() + Send>;

/// Receives the headers of the transferred copies (empty on failure)
pub type XferMsgsCallback = Box<dyn FnOnce(&MailOperation, &[MessageHeader]) + Send>;

/// Receives the refreshed folder
pub type RefreshCallback = Box<dyn FnOnce(&MailOperation, Option<&FolderInfo>) + Send>;

pub type MimePartSizeCallback = Box<dyn FnOnce(&MailOperation, Option<u64>) + Send>;

/// Queues the caller's destroy notification when dropped
struct DestroyOnDrop {
    notify: Option<DestroyNotify>,
    idle: IdleSender,
}

impl Drop for DestroyOnDrop {
    fn drop(&mut self) {
        if let Some(notify) = self.notify.take() {
            self.idle.idle_add(notify);
        }
    }
}

fn owning_folder(header: &MessageHeader) -> CoreResult<FolderId> {
    header
        .folder
        .clone()
        .ok_or_else(|| CoreError::ItemNotFound(format!("folder of message {}", header.id)))
}

fn fetch(ctx: &AppContext, header: &MessageHeader) -> CoreResult<Message> {
    let folder = owning_folder(header)?;
    let store = store_for(ctx, &folder.account)?;
    Ok(block_on(store.get_message(header))?)
}

/// Delete a message, flag it deleted and seen, and sync its folder
pub(crate) fn delete_message(store: &dyn Store, header: &MessageHeader) -> CoreResult<()> {
    let folder = owning_folder(header)?;
    block_on(store.remove_message(header))?;
    let mut flags = header.flags;
    flags.deleted = true;
    flags.seen = true;
    block_on(store.set_flags(header, flags))?;
    block_on(store.sync_folder(&folder, expunges_on_sync(store.protocol())))?;
    Ok(())
}

impl MailOperation {
    /// Fetch one full message
    pub fn get_msg(&self, header: MessageHeader, callback: Option<GetMsgCallback>) {
        self.start();
        let store = match owning_folder(&header).and_then(|f| {
            let store = store_for(self.context(), &f.account)?;
            self.set_account(&f.account, Some(store.clone()));
            Ok(store)
        }) {
            Ok(store) => store,
            Err(e) => {
                self.fail(e);
                if let Some(callback) = callback {
                    self.idle(move |op| callback(op, &header, None));
                }
                return self.notify_end();
            }
        };

        self.update_bytes(0, header.size);
        self.spawn(move |op| {
            let message = match block_on(store.get_message(&header)) {
                Ok(message) => {
                    let size = message.raw.len() as u64;
                    op.update_bytes(size, size);
                    op.update_progress(1, 1);
                    op.succeed();
                    Some(message)
                }
                Err(e) => {
                    op.fail(e.into());
                    None
                }
            };
            // A fetch that completes after a cancel is discarded
            let message = message.filter(|_| op.status() == OperationStatus::Success);
            if let Some(callback) = callback {
                op.idle(move |op| callback(op, &header, message.as_ref()));
            }
            op.notify_end();
        });
    }

    /// Fetch several messages on one worker thread.
    ///
    /// With more than one header, the batch is refused if any message is
    /// over the configured size limit. `destroy` runs exactly once, after
    /// every per-message callback.
    pub fn get_msgs_full(
        &self,
        headers: Vec<MessageHeader>,
        callback: Option<GetMsgsCallback>,
        destroy: Option<DestroyNotify>,
    ) {
        self.start();
        let guard = DestroyOnDrop {
            notify: destroy,
            idle: self.context().idle().clone(),
        };
        if let Err(e) = self.check_batch_size(&headers) {
            self.fail(e);
            drop(guard);
            return self.notify_end();
        }
        let account = headers
            .iter()
            .find_map(|h| h.folder.as_ref())
            .map(|f| f.account.clone());
        if let Some(account) = account {
            let store = self.context().accounts().store(&account);
            self.set_account(&account, store);
        }

        let total = headers.len() as u32;
        self.update_progress(0, total);
        self.spawn(move |op| {
            let mut fetched = 0;
            let mut last_error = None;
            for header in headers {
                if op.is_canceled() {
                    break;
                }
                match fetch(op.context(), &header) {
                    Ok(message) => {
                        fetched += 1;
                        op.update_progress(fetched, total);
                        if let Some(ref callback) = callback {
                            let callback = callback.clone();
                            op.idle(move |op| callback(op, &header, &message));
                        }
                    }
                    Err(e) if e.is_canceled() => {
                        last_error = Some(e);
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to fetch message {}: {}", header.id, e);
                        last_error = Some(e);
                    }
                }
            }
            debug!("Fetched {} of {} messages", fetched, total);
            op.finish_batch(fetched, last_error);
            drop(guard);
            op.notify_end();
        });
    }

    fn check_batch_size(&self, headers: &[MessageHeader]) -> CoreResult<()> {
        if headers.len() < 2 {
            return Ok(());
        }
        let limit = self.context().settings().size_limit_bytes();
        match headers.iter().find(|h| h.size > limit) {
            Some(header) => Err(CoreError::MessageSizeLimit(format!(
                "{:?} is {} bytes, limit is {}",
                header.subject(),
                header.size,
                limit
            ))),
            None => Ok(()),
        }
    }

    /// Terminal status of a batch: partial success is reported as such
    pub(crate) fn finish_batch(&self, succeeded: u32, last_error: Option<CoreError>) {
        match last_error {
            None => self.succeed(),
            Some(e) if e.is_canceled() => self.fail(e),
            Some(e) if succeeded > 0 => {
                warn!("{} finished with errors: {}", self.kind(), e);
                self.finish_with(OperationStatus::FinishedWithErrors, Some(e))
            }
            Some(e) => self.fail(e),
        }
    }

    /// Remove a message. With `remove_to_trash` it is moved to the account's
    /// trash unless it is already there.
    pub fn remove_msg(&self, header: MessageHeader, remove_to_trash: bool) {
        self.start();
        let prepared = owning_folder(&header).and_then(|folder| {
            let store = store_for(self.context(), &folder.account)?;
            self.set_account(&folder.account, Some(store.clone()));
            let trash = if remove_to_trash {
                block_on(store.special_folder(FolderType::Trash))?.filter(|t| t.id != folder)
            } else {
                None
            };
            Ok((store, trash))
        });
        match prepared {
            Err(e) => self.fail_now(e),
            Ok((_, Some(trash))) => {
                debug!("Moving message {} to {}", header.id, trash.id);
                self.xfer_msgs(vec![header], trash.id, true, None)
            }
            Ok((store, None)) => self.spawn(move |op| {
                let result = delete_message(store.as_ref(), &header);
                if result.is_ok() {
                    info!("Removed message {}", header.id);
                }
                op.finish(result);
                op.notify_end();
            }),
        }
    }

    /// Copy, or move with `delete_original`, messages of one folder into `dest`
    pub fn xfer_msgs(
        &self,
        headers: Vec<MessageHeader>,
        dest: FolderId,
        delete_original: bool,
        callback: Option<XferMsgsCallback>,
    ) {
        self.start();
        let (source, dest_store) = match self.prepare_xfer_msgs(&headers, &dest) {
            Ok(stores) => stores,
            Err(e) => {
                self.fail(e);
                if let Some(callback) = callback {
                    self.idle(move |op| callback(op, &[]));
                }
                return self.notify_end();
            }
        };

        self.spawn(move |op| {
            let progress = |done: u32, total: u32| op.update_progress(done, total);
            let result = if source.name() == dest_store.name() {
                block_on(source.transfer_messages(&headers, &dest, delete_original, &progress))
                    .map_err(CoreError::from)
            } else {
                transfer_across(&op, source.as_ref(), dest_store.as_ref(), &headers, &dest, delete_original)
            };
            let transferred = match result {
                Ok(transferred) => {
                    info!("Transferred {} messages to {}", transferred.len(), dest);
                    op.succeed();
                    transferred
                }
                Err(e) => {
                    op.fail(e);
                    Vec::new()
                }
            };
            if let Some(callback) = callback {
                op.idle(move |op| callback(op, &transferred));
            }
            op.notify_end();
        });
    }

    fn prepare_xfer_msgs(
        &self,
        headers: &[MessageHeader],
        dest: &FolderId,
    ) -> CoreResult<(Arc<dyn Store>, Arc<dyn Store>)> {
        let first = headers
            .first()
            .ok_or_else(|| CoreError::BadParameter("no messages to transfer".to_string()))?;
        let source = owning_folder(first)?;
        if headers.iter().any(|h| h.folder.as_ref() != Some(&source)) {
            return Err(CoreError::BadParameter(
                "messages belong to different folders".to_string(),
            ));
        }
        if &source == dest {
            return Err(CoreError::BadParameter(format!(
                "{} is both source and destination",
                dest
            )));
        }
        let source_store = store_for(self.context(), &source.account)?;
        self.set_account(&source.account, Some(source_store.clone()));
        let dest_store = store_for(self.context(), &dest.account)?;
        let dest_info = block_on(dest_store.folder(dest))?;
        if !FolderCapabilities::of_folder(&dest_info).can_write() {
            return Err(CoreError::FolderRules(format!("{} does not accept messages", dest)));
        }
        Ok((source_store, dest_store))
    }

    /// Refresh a folder's header list from its store
    pub fn refresh_folder(&self, folder: FolderId, callback: Option<RefreshCallback>) {
        self.start();
        let store = match store_for(self.context(), &folder.account) {
            Ok(store) => store,
            Err(e) => {
                self.fail(e);
                if let Some(callback) = callback {
                    self.idle(move |op| callback(op, None));
                }
                return self.notify_end();
            }
        };
        self.set_account(&folder.account, Some(store.clone()));
        self.update_progress(0, 1);

        self.spawn(move |op| {
            let observer = NewHeadersObserver::unlimited();
            let result = block_on(store.refresh_folder(&folder, &observer))
                .and_then(|()| block_on(store.folder(&folder)))
                .map_err(CoreError::from);
            let info = match result {
                Ok(info) => {
                    debug!("Refreshed {}: {} new headers", folder, observer.into_headers().len());
                    op.update_progress(1, 1);
                    op.succeed();
                    Some(info)
                }
                Err(e) => {
                    op.fail(e);
                    None
                }
            };
            if let Some(callback) = callback {
                op.idle(move |op| callback(op, info.as_ref()));
            }
            op.notify_end();
        });
    }

    /// Decoded size of the `index`-th attachment or inline part of `message`
    pub fn get_mime_part_size(&self, message: Message, index: usize, callback: MimePartSizeCallback) {
        self.start();
        self.spawn(move |op| {
            let size = match attachment_size(&message.raw, index) {
                Ok(size) => {
                    op.succeed();
                    Some(size)
                }
                Err(e) => {
                    op.fail(e.into());
                    None
                }
            };
            op.idle(move |op| callback(op, size));
            op.notify_end();
        });
    }
}

/// Move messages between accounts: fetch, add, then optionally delete
fn transfer_across(
    op: &MailOperation,
    source: &dyn Store,
    dest: &dyn Store,
    headers: &[MessageHeader],
    dest_folder: &FolderId,
    delete_original: bool,
) -> CoreResult<Vec<MessageHeader>> {
    let total = headers.len() as u32;
    let mut transferred = Vec::with_capacity(headers.len());
    for (position, header) in headers.iter().enumerate() {
        if op.is_canceled() {
            return Err(CoreError::OperationCanceled);
        }
        let message = block_on(source.get_message(header))?;
        transferred.push(block_on(dest.add_message(dest_folder, message))?);
        if delete_original {
            block_on(source.remove_message(header))?;
        }
        op.update_progress(position as u32 + 1, total);
    }
    if delete_original {
        if let Some(folder) = headers.first().and_then(|h| h.folder.as_ref()) {
            block_on(source.sync_folder(folder, expunges_on_sync(source.protocol())))?;
        }
    }
    Ok(transferred)
}
