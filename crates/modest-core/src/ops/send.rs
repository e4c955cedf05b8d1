//! Composition, sending and drafts

use super::message::delete_message;
use super::store_for;
use crate::{AppContext, CoreError, CoreResult, MailOperation};
use futures::executor::block_on;
use modest_mime::{compose, OutgoingMessage};
use modest_store::{FolderType, Message, MessageHeader, Transport};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives the composed message, `None` if it could not be built
pub type CreateMsgCallback = Box<dyn FnOnce(&MailOperation, Option<&Message>) + Send>;

/// Receives the header of the saved draft
pub type SaveToDraftsCallback = Box<dyn FnOnce(&MailOperation, Option<&MessageHeader>) + Send>;

fn compose_message(msg: &OutgoingMessage) -> CoreResult<Message> {
    compose(msg).map_err(|e| CoreError::InstanceCreationFailed(format!("message: {}", e)))
}

fn enqueue(transport: &dyn Transport, message: Message) -> CoreResult<()> {
    let queue = transport.send_queue().ok_or_else(|| {
        CoreError::InstanceCreationFailed(format!("send queue for {}", transport.name()))
    })?;
    block_on(queue.add(message))?;
    Ok(())
}

/// Remove a replaced or sent draft from wherever it lives
fn discard_draft(ctx: &AppContext, draft: &MessageHeader) -> CoreResult<()> {
    let folder = draft
        .folder
        .as_ref()
        .ok_or_else(|| CoreError::ItemNotFound(format!("folder of draft {}", draft.id)))?;
    let store = store_for(ctx, &folder.account)?;
    delete_message(store.as_ref(), draft)
}

impl MailOperation {
    /// Build a message on a worker thread
    pub fn create_msg(&self, msg: OutgoingMessage, callback: CreateMsgCallback) {
        self.start();
        self.spawn(move |op| {
            let message = match compose_message(&msg) {
                Ok(message) => {
                    op.succeed();
                    Some(message)
                }
                Err(e) => {
                    op.fail(e);
                    None
                }
            };
            op.idle(move |op| callback(op, message.as_ref()));
            op.notify_end();
        });
    }

    fn transport_for(&self, account: &str) -> CoreResult<Arc<dyn Transport>> {
        let transport = self
            .context()
            .accounts()
            .transport(account)
            .ok_or_else(|| CoreError::ItemNotFound(format!("transport of {}", account)))?;
        let store = self.context().accounts().store(account);
        self.set_account(account, store);
        Ok(transport)
    }

    /// Put an already composed message on `account`'s send queue
    pub fn send_mail(&self, account: &str, message: Message) {
        self.start();
        let transport = match self.transport_for(account) {
            Ok(transport) => transport,
            Err(e) => return self.fail_now(e),
        };
        self.spawn(move |op| {
            let result = enqueue(transport.as_ref(), message);
            if result.is_ok() {
                info!("Queued message on {}", transport.name());
            }
            op.finish(result);
            op.notify_end();
        });
    }

    /// Compose and send a new message. If it was edited from `draft`, that
    /// draft is removed once the message is queued.
    pub fn send_new_mail(&self, account: &str, draft: Option<MessageHeader>, msg: OutgoingMessage) {
        self.start();
        if msg.to.is_empty() {
            return self.fail_now(CoreError::BadParameter("no recipients".to_string()));
        }
        let transport = match self.transport_for(account) {
            Ok(transport) => transport,
            Err(e) => return self.fail_now(e),
        };
        self.spawn(move |op| {
            let result = compose_message(&msg).and_then(|message| enqueue(transport.as_ref(), message));
            if result.is_ok() {
                info!("Queued {:?} on {}", msg.subject, transport.name());
                if let Some(draft) = draft {
                    if let Err(e) = discard_draft(op.context(), &draft) {
                        warn!("Failed to remove sent draft {}: {}", draft.id, e);
                    }
                }
            }
            op.finish(result);
            op.notify_end();
        });
    }

    /// Store a message in the Drafts folder, replacing `draft` if given.
    ///
    /// The old draft is deleted before the new one is added.
    pub fn save_to_drafts(
        &self,
        account: &str,
        draft: Option<MessageHeader>,
        msg: OutgoingMessage,
        callback: Option<SaveToDraftsCallback>,
    ) {
        self.start();
        let store = self.context().accounts().store(account);
        self.set_account(account, store);
        self.spawn(move |op| {
            let result = save_draft(op.context(), draft.as_ref(), &msg);
            let saved = match result {
                Ok(header) => {
                    debug!("Saved draft {}", header.id);
                    op.succeed();
                    Some(header)
                }
                Err(e) => {
                    op.fail(e);
                    None
                }
            };
            if let Some(callback) = callback {
                op.idle(move |op| callback(op, saved.as_ref()));
            }
            op.notify_end();
        });
    }
}

fn save_draft(
    ctx: &AppContext,
    previous: Option<&MessageHeader>,
    msg: &OutgoingMessage,
) -> CoreResult<MessageHeader> {
    let mut message = compose_message(msg)?;
    message.header.flags.draft = true;
    message.header.flags.seen = true;

    let local = ctx.accounts().local_folders();
    let drafts = block_on(local.special_folder(FolderType::Drafts))?
        .ok_or_else(|| CoreError::ItemNotFound("drafts folder".to_string()))?;
    if let Some(previous) = previous {
        if let Err(e) = discard_draft(ctx, previous) {
            warn!("Failed to remove previous draft {}: {}", previous.id, e);
        }
    }
    Ok(block_on(local.add_message(&drafts.id, message))?)
}
