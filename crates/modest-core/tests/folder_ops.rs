mod common;

use common::{assert_well_formed, message, Fixture};
use modest_core::{ErrorKind, MailOperation, OperationKind, OperationStatus, LOCAL_FOLDERS_ACCOUNT};
use modest_store::{FolderId, FolderInfo, FolderRules, FolderType, ParentRef};
use std::sync::{Arc, Mutex};

fn local_root() -> ParentRef {
    ParentRef::Account(LOCAL_FOLDERS_ACCOUNT.to_string())
}

#[test]
fn test_create_existing_folder_fails_without_store_call() {
    let fx = Fixture::new();

    let op = fx.op(OperationKind::CreateFolder);
    op.create_folder(local_root(), "Drafts", None);
    // Validation failures are resolved before returning
    assert_eq!(op.status(), OperationStatus::Failed);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderExists);
    assert_well_formed(&fx.finish(&op));

    let work = fx.imap.insert_folder("Work", FolderType::Normal, FolderRules::empty());
    fx.imap.insert_folder("Work/Drafts", FolderType::Drafts, FolderRules::empty());
    let op = fx.op(OperationKind::CreateFolder);
    op.create_folder(ParentRef::Folder(work), "Drafts", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderExists);
    fx.finish(&op);

    assert_eq!(fx.local.stats().create_folder, 0);
    assert_eq!(fx.imap.stats().create_folder, 0);
}

#[test]
fn test_create_folder_rejects_invalid_names() {
    let fx = Fixture::new();
    for name in [" ", "a/b"] {
        let op = fx.op(OperationKind::CreateFolder);
        op.create_folder(ParentRef::Account("imap".into()), name, None);
        assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules, "{:?}", name);
        assert_well_formed(&fx.finish(&op));
    }
    assert_eq!(fx.imap.stats().create_folder, 0);
}

#[test]
fn test_create_folder_rejects_reserved_local_names() {
    let fx = Fixture::new();
    for name in ["drafts", "INBOX", " Trash "] {
        let op = fx.op(OperationKind::CreateFolder);
        op.create_folder(local_root(), name, None);
        assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules, "{:?}", name);
        assert_well_formed(&fx.finish(&op));
    }
    assert_eq!(fx.local.stats().create_folder, 0);

    // Only the local-folders root reserves them
    let op = fx.op(OperationKind::CreateFolder);
    op.create_folder(ParentRef::Account("imap".into()), "drafts", None);
    assert_well_formed(&fx.finish(&op));
    assert_eq!(op.status(), OperationStatus::Success);
}

#[test]
fn test_create_folder_respects_parent_rules() {
    let fx = Fixture::new();

    let outbox = FolderId::new(LOCAL_FOLDERS_ACCOUNT, "Outbox");
    let op = fx.op(OperationKind::CreateFolder);
    op.create_folder(ParentRef::Folder(outbox), "Later", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);

    let op = fx.op(OperationKind::CreateFolder);
    op.create_folder(ParentRef::Account("pop".into()), "Archive", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);

    let op = fx.op(OperationKind::CreateFolder);
    op.create_folder(ParentRef::Account("nowhere".into()), "Archive", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::ItemNotFound);
    fx.finish(&op);
}

#[test]
fn test_create_folder_reports_result_before_end() {
    let fx = Fixture::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    let op = fx.op(OperationKind::CreateFolder);
    let log = events.clone();
    op.connect_progress_changed(move |_, s| {
        if s.finished {
            log.lock().unwrap().push("end".to_string());
        }
    });
    let log = events.clone();
    op.create_folder(
        ParentRef::Folder(fx.inbox.clone()),
        "Receipts",
        Some(Box::new(move |_: &MailOperation, info: Option<&FolderInfo>| {
            log.lock().unwrap().push(info.unwrap().id.to_string());
        })),
    );
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::Success);
    assert_eq!(*events.lock().unwrap(), vec!["imap:INBOX/Receipts", "end"]);
    assert!(fx.imap.has_folder(&FolderId::new("imap", "INBOX/Receipts")));
    assert_eq!(fx.imap.stats().create_folder, 1);
}

#[test]
fn test_rename_folder() {
    let fx = Fixture::new();
    let work = fx.imap.insert_folder("Work", FolderType::Normal, FolderRules::empty());
    let reports = fx.imap.insert_folder("Work/Reports", FolderType::Normal, FolderRules::empty());
    fx.imap.insert_message(&reports, message(&reports, "q3", 100, 0));

    let op = fx.op(OperationKind::RenameFolder);
    op.rename_folder(work.clone(), "Jobs", None);
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::Success);
    assert!(!fx.imap.has_folder(&work));
    assert_eq!(fx.imap.folder_headers(&FolderId::new("imap", "Jobs/Reports")).len(), 1);
    let last = snapshots.last().unwrap();
    assert_eq!((last.done, last.total), (2, 2));
}

#[test]
fn test_rename_folder_rules() {
    let fx = Fixture::new();

    // Special folders cannot be renamed
    let op = fx.op(OperationKind::RenameFolder);
    op.rename_folder(FolderId::new(LOCAL_FOLDERS_ACCOUNT, "Drafts"), "Old drafts", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);

    // Nor may a local folder take a special folder's name, in any case
    let notes = fx.local.insert_folder("Notes", FolderType::Normal, FolderRules::empty());
    let op = fx.op(OperationKind::RenameFolder);
    op.rename_folder(notes.clone(), "inbox", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);

    let op = fx.op(OperationKind::RenameFolder);
    op.rename_folder(notes, "Ideas/2024", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);

    let work = fx.imap.insert_folder("Work", FolderType::Normal, FolderRules::empty());
    fx.imap.insert_folder("Archive", FolderType::Archive, FolderRules::empty());
    let op = fx.op(OperationKind::RenameFolder);
    op.rename_folder(work, "Archive", None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderExists);
    fx.finish(&op);

    assert_eq!(fx.local.stats().copy_folder, 0);
    assert_eq!(fx.imap.stats().copy_folder, 0);
}

#[test]
fn test_xfer_folder_into_itself_fails() {
    let fx = Fixture::new();
    let work = fx.imap.insert_folder("Work", FolderType::Normal, FolderRules::empty());
    let reports = fx.imap.insert_folder("Work/Reports", FolderType::Normal, FolderRules::empty());

    for target in [work.clone(), reports] {
        let op = fx.op(OperationKind::TransferFolder);
        op.xfer_folder(work.clone(), ParentRef::Folder(target), true, None);
        assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
        fx.finish(&op);
    }
    assert_eq!(fx.imap.stats().copy_folder, 0);
}

#[test]
fn test_xfer_folder_to_another_account() {
    let fx = Fixture::new();
    let work = fx.imap.insert_folder("Work", FolderType::Normal, FolderRules::empty());
    let reports = fx.imap.insert_folder("Work/Reports", FolderType::Normal, FolderRules::empty());
    fx.imap.insert_message(&work, message(&work, "plan", 100, 10));
    fx.imap.insert_message(&reports, message(&reports, "q3", 100, 5));

    let moved = Arc::new(Mutex::new(None));
    let slot = moved.clone();
    let op = fx.op(OperationKind::TransferFolder);
    op.xfer_folder(
        work.clone(),
        local_root(),
        true,
        Some(Box::new(move |_: &MailOperation, info: Option<&FolderInfo>| {
            *slot.lock().unwrap() = info.map(|i| i.id.clone());
        })),
    );
    let snapshots = fx.finish(&op);

    assert_well_formed(&snapshots);
    assert_eq!(op.status(), OperationStatus::Success);
    let local_work = FolderId::new(LOCAL_FOLDERS_ACCOUNT, "Work");
    assert_eq!(*moved.lock().unwrap(), Some(local_work.clone()));
    assert_eq!(fx.local.folder_headers(&local_work).len(), 1);
    assert_eq!(fx.local.folder_headers(&local_work.child("Reports")).len(), 1);
    assert!(!fx.imap.has_folder(&work));
}

#[test]
fn test_xfer_folder_reserved_name_in_local_folders() {
    let fx = Fixture::new();
    let sent = fx.imap.insert_folder("Sent", FolderType::Sent, FolderRules::empty());

    let op = fx.op(OperationKind::TransferFolder);
    op.xfer_folder(sent, local_root(), false, None);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);
    assert_eq!(fx.local.stats().create_folder, 0);
}

#[test]
fn test_remove_folder_modes() {
    let fx = Fixture::new();
    let work = fx.imap.insert_folder("Work", FolderType::Normal, FolderRules::empty());
    let old = fx.imap.insert_folder("Old", FolderType::Normal, FolderRules::empty());

    let op = fx.op(OperationKind::RemoveFolder);
    op.remove_folder(old.clone(), false);
    assert_well_formed(&fx.finish(&op));
    assert_eq!(op.status(), OperationStatus::Success);
    assert!(!fx.imap.has_folder(&old));

    let op = fx.op(OperationKind::RemoveFolder);
    op.remove_folder(work.clone(), true);
    assert_well_formed(&fx.finish(&op));
    assert_eq!(op.status(), OperationStatus::Success);
    let trashed = FolderId::new("imap", "Trash/Work");
    assert!(fx.imap.has_folder(&trashed));
    assert!(!fx.imap.has_folder(&work));

    // Already in the trash: deleted for good
    let op = fx.op(OperationKind::RemoveFolder);
    op.remove_folder(trashed.clone(), true);
    fx.finish(&op);
    assert_eq!(op.status(), OperationStatus::Success);
    assert!(!fx.imap.has_folder(&trashed));
    assert_eq!(fx.imap.stats().remove_folder, 2);
}

#[test]
fn test_remove_folder_rules() {
    let fx = Fixture::new();

    let op = fx.op(OperationKind::RemoveFolder);
    op.remove_folder(fx.inbox.clone(), false);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::FolderRules);
    fx.finish(&op);

    // POP accounts have no trash to move into
    let misc = fx.pop.insert_folder("Misc", FolderType::Normal, FolderRules::empty());
    let op = fx.op(OperationKind::RemoveFolder);
    op.remove_folder(misc, true);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::ItemNotFound);
    fx.finish(&op);

    let op = fx.op(OperationKind::RemoveFolder);
    op.remove_folder(FolderId::new("imap", "Missing"), false);
    assert_eq!(op.error().unwrap().kind(), ErrorKind::ItemNotFound);
    fx.finish(&op);

    assert_eq!(fx.imap.stats().remove_folder, 0);
    assert_eq!(fx.pop.stats().remove_folder, 0);
}
