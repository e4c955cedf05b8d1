//! What a folder (or account root) allows.
//!
//! Every folder operation asks these questions before touching a store,
//! instead of testing rule bits and names itself.

use crate::{CoreError, CoreResult};
use modest_store::{FolderInfo, FolderRules, Store};

/// Names the local folders account keeps for its special folders
pub const RESERVED_LOCAL_NAMES: [&str; 5] = ["Inbox", "Outbox", "Drafts", "Sent", "Trash"];

/// Capabilities of a folder store, either an account root or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderCapabilities {
    rules: FolderRules,
    /// Top level of the local folders account
    local_root: bool,
}

impl FolderCapabilities {
    pub fn of_folder(info: &FolderInfo) -> Self {
        Self {
            rules: info.rules,
            local_root: false,
        }
    }

    /// Capabilities of an account's top level
    pub fn of_root(store: &dyn Store, is_local_folders: bool) -> Self {
        let mut rules = FolderRules::NON_DELETABLE | FolderRules::NON_MOVEABLE | FolderRules::NON_RENAMEABLE;
        if !store.can_create_root_folders() {
            rules |= FolderRules::NON_WRITABLE;
        }
        Self {
            rules,
            local_root: is_local_folders,
        }
    }

    /// May receive new folders or messages
    pub fn can_write(&self) -> bool {
        !self.rules.contains(FolderRules::NON_WRITABLE)
    }

    pub fn can_delete(&self) -> bool {
        !self.rules.contains(FolderRules::NON_DELETABLE)
    }

    pub fn can_rename(&self) -> bool {
        !self.rules.contains(FolderRules::NON_RENAMEABLE)
    }

    pub fn can_move(&self) -> bool {
        !self.rules.contains(FolderRules::NON_MOVEABLE)
    }

    /// Whether a child called `name` would shadow a special local folder
    pub fn is_reserved_name(&self, name: &str) -> bool {
        self.local_root
            && RESERVED_LOCAL_NAMES
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(name.trim()))
    }
}

/// Reject names no store can represent
pub fn validate_folder_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::BadParameter("empty folder name".to_string()));
    }
    if name == " " || name.contains('/') {
        return Err(CoreError::FolderRules(format!("invalid folder name {:?}", name)));
    }
    Ok(())
}
