#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use modest_core::{
    Account, AccountRegistry, AccountSettings, AppContext, IdleLoop, MailOperation, MailSettings,
    MemoryConf, OperationKind, OperationStatus, StateSnapshot, LOCAL_FOLDERS_ACCOUNT,
};
use modest_store::{
    FolderId, FolderRules, FolderType, MemoryStore, MemoryTransport, Message, MessageHeader, Protocol,
};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Application with an IMAP account, a POP account and the local folders
pub struct Fixture {
    pub ctx: Arc<AppContext>,
    pub idle: IdleLoop,
    pub conf: Arc<MemoryConf>,
    pub imap: Arc<MemoryStore>,
    pub pop: Arc<MemoryStore>,
    pub local: Arc<MemoryStore>,
    pub smtp: Arc<MemoryTransport>,
    pub inbox: FolderId,
    pub pop_inbox: FolderId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(AccountSettings::new("imap"), MailSettings::default())
    }

    pub fn with_settings(imap_settings: AccountSettings, settings: MailSettings) -> Self {
        Self::build(imap_settings, settings, Arc::new(MemoryTransport::new("smtp")))
    }

    pub fn build(
        imap_settings: AccountSettings,
        settings: MailSettings,
        smtp: Arc<MemoryTransport>,
    ) -> Self {
        init_tracing();
        let local = Arc::new(MemoryStore::local_folders(LOCAL_FOLDERS_ACCOUNT));
        let imap = Arc::new(MemoryStore::new("imap", Protocol::Imap));
        let inbox = imap.insert_folder("INBOX", FolderType::Inbox, FolderRules::NON_DELETABLE);
        imap.insert_folder("Trash", FolderType::Trash, FolderRules::NON_DELETABLE);
        let pop = Arc::new(MemoryStore::new("pop", Protocol::Pop));
        let pop_inbox = pop.insert_folder("INBOX", FolderType::Inbox, FolderRules::NON_DELETABLE);

        let accounts = AccountRegistry::with_local_folders(local.clone());
        accounts.add(Account::new(imap_settings, imap.clone()).with_transport(smtp.clone()));
        accounts.add(Account::new(AccountSettings::new("pop"), pop.clone()));

        let conf = Arc::new(MemoryConf::new());
        let (ctx, idle) = AppContext::new(accounts, conf.clone(), settings);
        Self {
            ctx,
            idle,
            conf,
            imap,
            pop,
            local,
            smtp,
            inbox,
            pop_inbox,
        }
    }

    pub fn op(&self, kind: OperationKind) -> MailOperation {
        self.ctx.new_operation(kind, None)
    }

    /// Dispatch the UI loop until `op` has ended; returns every snapshot
    /// it delivered
    pub fn finish(&self, op: &MailOperation) -> Vec<StateSnapshot> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        op.connect_progress_changed(move |_, snapshot| sink.lock().unwrap().push(*snapshot));
        let ended = self.idle.run_until(
            || seen.lock().unwrap().last().is_some_and(|s: &StateSnapshot| s.finished),
            Duration::from_secs(10),
        );
        assert!(ended, "{:?} did not end", op);
        // Anything queued after the end (there should be nothing) runs too
        self.idle.dispatch_pending();
        let snapshots = seen.lock().unwrap().clone();
        snapshots
    }
}

/// A message `minutes_ago` old of `size` bytes
pub fn message(folder: &FolderId, subject: &str, size: u64, minutes_ago: i64) -> Message {
    let header = MessageHeader::new(folder.clone(), subject, size)
        .with_subject(subject)
        .with_date(Utc::now() - ChronoDuration::minutes(minutes_ago));
    Message::new(header, format!("Subject: {}\r\n\r\nbody", subject).into_bytes())
}

/// Statuses never move backwards and only the last snapshot is final
pub fn assert_well_formed(snapshots: &[StateSnapshot]) {
    fn rank(status: OperationStatus) -> u8 {
        match status {
            OperationStatus::Invalid => 0,
            OperationStatus::InProgress => 1,
            _ => 2,
        }
    }
    assert!(!snapshots.is_empty());
    for pair in snapshots.windows(2) {
        assert!(rank(pair[0].status) <= rank(pair[1].status), "{:?}", snapshots);
        if rank(pair[0].status) == 2 {
            assert_eq!(pair[0].status, pair[1].status, "{:?}", snapshots);
        }
    }
    for snapshot in snapshots {
        if snapshot.total > 0 {
            assert!(snapshot.done <= snapshot.total, "{:?}", snapshot);
        }
    }
    let last = snapshots.last().unwrap();
    assert!(last.finished);
    assert!(last.status.is_finished());
    assert_eq!(snapshots.iter().filter(|s| s.finished).count(), 1);
}
