mod common;

use common::{assert_well_formed, message, Fixture};
use modest_core::ops::UpdateAccountCallback;
use modest_core::{
    AccountSettings, ConfStore, ErrorKind, MailOperation, MailSettings, OperationKind, OperationStatus,
    RetrieveType,
};
use modest_store::{FolderId, FolderRules, FolderType, MemoryTransport};
use std::sync::{Arc, Mutex};

fn downloading(limit: usize) -> AccountSettings {
    AccountSettings::new("imap").with_retrieve(RetrieveType::Messages, limit)
}

/// Records the new header count and whether the update time was already
/// stored when the callback ran
fn recorder(fx: &Fixture) -> (Arc<Mutex<Option<(usize, bool)>>>, UpdateAccountCallback) {
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let conf = fx.conf.clone();
    let callback: UpdateAccountCallback = Box::new(move |op: &MailOperation, count: usize| {
        let account = op.account_name().unwrap_or_default();
        *slot.lock().unwrap() = Some((count, conf.last_updated(&account).is_some()));
    });
    (seen, callback)
}

#[test]
fn test_update_account_downloads_within_size_limit() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::with_size_limit_kb(10));
    fx.imap.deliver(&fx.inbox, message(&fx.inbox, "five", 5 * 1024, 30));
    fx.imap.deliver(&fx.inbox, message(&fx.inbox, "fifteen", 15 * 1024, 20));
    fx.imap.deliver(&fx.inbox, message(&fx.inbox, "two", 2 * 1024, 10));

    let (seen, callback) = recorder(&fx);
    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", Some(callback));
    assert!(fx.conf.is_busy("imap"));
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::Success);
    assert_eq!(*seen.lock().unwrap(), Some((2, true)));
    assert_eq!(fx.imap.stats().get_message, 2);
    let last = snapshots.last().unwrap();
    assert_eq!((last.done, last.total), (2, 2));

    assert!(fx.conf.last_updated("imap").is_some());
    assert!(!fx.conf.is_busy("imap"));
    assert_eq!(fx.smtp.queue().unwrap().flush_count(), 1);
}

#[test]
fn test_update_account_retrieval_limit() {
    let fx = Fixture::with_settings(downloading(5), MailSettings::default());
    for i in 0..6 {
        fx.imap.deliver(&fx.inbox, message(&fx.inbox, &format!("m{}", i), 100, i));
    }

    let (seen, callback) = recorder(&fx);
    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", Some(callback));
    assert_well_formed(&fx.finish(&op));

    assert_eq!(op.status(), OperationStatus::Failed);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::RetrievalNumberLimit);
    assert_eq!(*seen.lock().unwrap(), Some((6, false)));
    assert_eq!(fx.imap.stats().get_message, 0);
    assert!(fx.conf.last_updated("imap").is_none());
    assert!(!fx.conf.is_busy("imap"));
}

#[test]
fn test_update_account_headers_only_pokes_folders() {
    let fx = Fixture::new();
    fx.imap.deliver(&fx.inbox, message(&fx.inbox, "later", 100, 0));

    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", None);
    assert_well_formed(&fx.finish(&op));

    assert_eq!(op.status(), OperationStatus::Success);
    let stats = fx.imap.stats();
    assert_eq!(stats.poke_status, 2);
    assert_eq!(stats.refresh_folder, 0);
    assert_eq!(stats.get_message, 0);
    assert!(fx.conf.last_updated("imap").is_some());
}

#[test]
fn test_update_account_skips_unsubscribed_folders() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::default());
    let lists = fx.imap.insert_folder("Lists", FolderType::Normal, FolderRules::empty());
    fx.imap.unsubscribe(&lists);
    fx.imap.deliver(&lists, message(&lists, "digest", 100, 0));

    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", None);
    fx.finish(&op);

    assert_eq!(op.status(), OperationStatus::Success);
    assert_eq!(fx.imap.stats().refresh_folder, 2);
    assert!(fx.imap.folder_headers(&lists).is_empty());
}

#[test]
fn test_update_account_requires_send_queue() {
    let fx = Fixture::build(
        downloading(0),
        MailSettings::default(),
        Arc::new(MemoryTransport::without_queue("smtp")),
    );
    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", None);
    assert_well_formed(&fx.finish(&op));
    assert_eq!(op.error().unwrap().kind(), ErrorKind::InstanceCreationFailed);
    assert!(fx.conf.last_updated("imap").is_none());

    // An account without any transport cannot flush either
    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("pop", None);
    fx.finish(&op);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::InstanceCreationFailed);
}

#[test]
fn test_update_unknown_account() {
    let fx = Fixture::new();
    let (seen, callback) = recorder(&fx);
    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("nowhere", Some(callback));
    assert_eq!(op.error().unwrap().kind(), ErrorKind::ItemNotFound);
    assert_well_formed(&fx.finish(&op));
    assert_eq!(*seen.lock().unwrap(), Some((0, false)));
}

#[test]
fn test_update_account_canceled_before_start() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::default());
    fx.imap.deliver(&fx.inbox, message(&fx.inbox, "unread", 100, 0));

    let op = fx.op(OperationKind::UpdateAccount);
    assert!(op.cancel());
    op.update_account("imap", None);
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::Canceled);
    assert_eq!(fx.imap.stats().refresh_folder, 0);
    assert!(fx.conf.last_updated("imap").is_none());
    assert!(!fx.conf.is_busy("imap"));
    assert!(!op.cancel());
}

#[test]
fn test_update_account_downloads_newest_first() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::default());
    let older = fx.imap.deliver(&fx.inbox, message(&fx.inbox, "older", 100, 30));
    let newest = fx.imap.deliver(&fx.inbox, message(&fx.inbox, "newest", 100, 1));
    let oldest = fx.imap.deliver(&fx.inbox, message(&fx.inbox, "oldest", 100, 60));

    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", None);
    assert_well_formed(&fx.finish(&op));

    assert_eq!(op.status(), OperationStatus::Success);
    assert_eq!(fx.imap.fetched(), vec![newest.id, older.id, oldest.id]);
}

#[test]
fn test_update_account_finishes_with_errors() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::default());
    let good = fx.imap.deliver(&fx.inbox, message(&fx.inbox, "good", 100, 10));
    let bad = fx.imap.deliver(&fx.inbox, message(&fx.inbox, "bad", 100, 5));
    fx.imap.make_unavailable(&bad);

    let (seen, callback) = recorder(&fx);
    let op = fx.op(OperationKind::UpdateAccount);
    op.update_account("imap", Some(callback));
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::FinishedWithErrors);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::Unclassified);
    assert_eq!(*seen.lock().unwrap(), Some((2, true)));
    assert_eq!(fx.imap.fetched(), vec![good.id]);
    assert_eq!(fx.imap.stats().get_message, 2);
    assert!(!fx.conf.is_busy("imap"));
}

#[test]
fn test_update_account_cancel_between_folders() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::default());
    fx.imap.deliver(&fx.inbox, message(&fx.inbox, "unread", 100, 0));

    let op = fx.op(OperationKind::UpdateAccount);
    let running = op.clone();
    fx.imap.on_refresh(move |_| {
        running.cancel();
    });
    op.update_account("imap", None);
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::Canceled);
    // INBOX was refreshed, Trash never was
    assert_eq!(fx.imap.stats().refresh_folder, 1);
    assert_eq!(fx.imap.stats().get_message, 0);
    assert!(fx.conf.last_updated("imap").is_none());
}

#[test]
fn test_late_cancel_does_not_reach_next_operation() {
    let fx = Fixture::with_settings(downloading(0), MailSettings::default());
    let trash = FolderId::new("imap", "Trash");

    // Canceled after the last refresh: no store call is left to consume it
    let update = fx.op(OperationKind::UpdateAccount);
    let running = update.clone();
    fx.imap.on_refresh(move |folder: &FolderId| {
        if *folder == trash {
            running.cancel();
        }
    });
    update.update_account("imap", None);
    fx.finish(&update);
    assert_eq!(update.status(), OperationStatus::Canceled);
    assert!(!fx.imap.cancel_requested());

    let refresh = fx.op(OperationKind::RefreshFolder);
    refresh.refresh_folder(fx.inbox.clone(), None);
    assert_well_formed(&fx.finish(&refresh));
    assert_eq!(refresh.status(), OperationStatus::Success);
    assert!(refresh.error().is_none());
}
