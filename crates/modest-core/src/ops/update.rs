//! Account update: refresh every subscribed folder, download new messages,
//! then flush the outbound queue

use crate::{Account, CoreError, CoreResult, MailOperation, MailSettings, NewHeadersObserver, OperationStatus};
use chrono::Utc;
use futures::executor::block_on;
use modest_store::{MessageHeader, StoreError};
use tracing::{debug, info, warn};

/// Receives the number of new headers the update discovered
pub type UpdateAccountCallback = Box<dyn FnOnce(&MailOperation, usize) + Send>;

#[derive(Debug, Default)]
struct Downloads {
    done: u32,
    failed: u32,
    last_error: Option<CoreError>,
}

impl MailOperation {
    /// Update `account_name`. The callback and the end notification run
    /// whatever the outcome.
    pub fn update_account(&self, account_name: &str, callback: Option<UpdateAccountCallback>) {
        self.start();
        let Some(account) = self.context().accounts().get(account_name) else {
            self.fail(CoreError::ItemNotFound(format!("account {}", account_name)));
            if let Some(callback) = callback {
                self.idle(move |op| callback(op, 0));
            }
            return self.notify_end();
        };

        info!("Updating account {}", account_name);
        self.set_account(account_name, Some(account.store.clone()));
        let settings = self.context().settings();

        self.spawn(move |op| {
            let mut new_headers = 0;
            match update_account(&op, &account, settings, &mut new_headers) {
                Ok(downloads) => {
                    if downloads.failed == 0 {
                        op.succeed();
                    } else {
                        op.finish_batch(downloads.done, downloads.last_error);
                    }
                }
                Err(e) => op.fail(e),
            }

            if matches!(
                op.status(),
                OperationStatus::Success | OperationStatus::FinishedWithErrors
            ) {
                let name = account.name().to_string();
                op.idle(move |op| {
                    if let Err(e) = op.context().conf().set_last_updated(&name, Utc::now()) {
                        warn!("Failed to record update time of {}: {}", name, e);
                    }
                });
            }
            if let Some(callback) = callback {
                op.idle(move |op| callback(op, new_headers));
            }
            info!("Account update finished: {}", account.name());
            op.notify_end();
        });
    }
}

fn canceled_or_warn(e: StoreError, what: &str) -> CoreResult<()> {
    if e == StoreError::Canceled {
        return Err(CoreError::OperationCanceled);
    }
    warn!("{}: {}", what, e);
    Ok(())
}

fn update_account(
    op: &MailOperation,
    account: &Account,
    settings: MailSettings,
    new_headers: &mut usize,
) -> CoreResult<Downloads> {
    let store = account.store.as_ref();
    let folders = block_on(store.list_folders(true))?;
    debug!("{}: {} subscribed folders", account.name(), folders.len());

    let download = account.settings.retrieve_type.downloads_messages();
    let mut headers: Vec<MessageHeader> = Vec::new();
    for folder in &folders {
        if op.is_canceled() {
            return Err(CoreError::OperationCanceled);
        }
        if download {
            let observer = NewHeadersObserver::new(settings.size_limit_bytes());
            match block_on(store.refresh_folder(&folder.id, &observer)) {
                Ok(()) => headers.extend(observer.into_headers()),
                Err(e) => canceled_or_warn(e, &format!("Failed to refresh {}", folder.id))?,
            }
        } else if let Err(e) = block_on(store.poke_status(&folder.id)) {
            canceled_or_warn(e, &format!("Failed to poke {}", folder.id))?;
        }
    }
    if op.is_canceled() {
        return Err(CoreError::OperationCanceled);
    }

    *new_headers = headers.len();
    let limit = account.settings.effective_retrieve_limit();
    if headers.len() > limit {
        // TODO: offer downloading only the newest `limit` messages instead of failing
        return Err(CoreError::RetrievalNumberLimit(format!(
            "{} new messages, limit is {}",
            headers.len(),
            limit
        )));
    }

    headers.sort_by(|a, b| b.date_sent.cmp(&a.date_sent));
    let total = headers.len().min(limit) as u32;
    let mut downloads = Downloads::default();
    for header in headers.iter().take(total as usize) {
        if op.is_canceled() {
            return Err(CoreError::OperationCanceled);
        }
        match block_on(store.get_message(header)) {
            Ok(_) => {
                downloads.done += 1;
                op.update_progress(downloads.done, total);
            }
            Err(StoreError::Canceled) => return Err(CoreError::OperationCanceled),
            Err(e) => {
                warn!("Failed to download message {}: {}", header.id, e);
                downloads.failed += 1;
                downloads.last_error = Some(e.into());
            }
        }
    }
    debug!("{}: downloaded {} of {} messages", account.name(), downloads.done, total);

    let transport = account.transport.as_ref().ok_or_else(|| {
        CoreError::InstanceCreationFailed(format!("transport for {}", account.name()))
    })?;
    let queue = transport.send_queue().ok_or_else(|| {
        CoreError::InstanceCreationFailed(format!("send queue for {}", transport.name()))
    })?;
    if let Err(e) = block_on(queue.flush()) {
        warn!("Failed to flush send queue of {}: {}", transport.name(), e);
    }

    Ok(downloads)
}
