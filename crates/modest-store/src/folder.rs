//! Folder types

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a folder inside its account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderType {
    /// User-created folder
    Normal,
    /// Inbox folder
    Inbox,
    /// Messages waiting to be sent
    Outbox,
    /// Draft messages
    Drafts,
    /// Sent messages
    Sent,
    /// Trash/deleted messages
    Trash,
    /// Spam/junk
    Junk,
    /// Archive
    Archive,
}

impl FolderType {
    /// Detect folder type from its name (fallback when the store has no role info)
    pub fn from_name(name: &str) -> Self {
        let name_lower = name.to_lowercase();
        if name_lower == "inbox" {
            FolderType::Inbox
        } else if name_lower == "outbox" {
            FolderType::Outbox
        } else if name_lower.contains("sent") {
            FolderType::Sent
        } else if name_lower.contains("draft") {
            FolderType::Drafts
        } else if name_lower.contains("trash") || name_lower.contains("deleted") {
            FolderType::Trash
        } else if name_lower.contains("spam") || name_lower.contains("junk") {
            FolderType::Junk
        } else if name_lower.contains("archive") {
            FolderType::Archive
        } else {
            FolderType::Normal
        }
    }
}

bitflags! {
    /// What a folder forbids
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FolderRules: u8 {
        /// No messages or child folders may be added
        const NON_WRITABLE = 1 << 0;
        /// The folder cannot be removed
        const NON_DELETABLE = 1 << 1;
        /// The folder cannot be moved to another parent
        const NON_MOVEABLE = 1 << 2;
        /// The folder cannot be renamed
        const NON_RENAMEABLE = 1 << 3;
    }
}

impl FolderRules {
    /// Rules applied to the mandatory folders of the local account
    pub fn special() -> Self {
        FolderRules::NON_DELETABLE | FolderRules::NON_MOVEABLE | FolderRules::NON_RENAMEABLE
    }
}

/// Identifies a folder across every account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderId {
    /// Name of the owning account
    pub account: String,
    /// Full path inside the account, '/' separated
    pub path: String,
}

impl FolderId {
    pub fn new(account: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            path: path.into(),
        }
    }

    /// Id of a child folder called `name`
    pub fn child(&self, name: &str) -> Self {
        Self::new(self.account.clone(), format!("{}/{}", self.path, name))
    }

    /// Last path component
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Whether `self` is `other` or lives somewhere below it
    pub fn is_within(&self, other: &FolderId) -> bool {
        self.account == other.account
            && (self.path == other.path
                || self
                    .path
                    .strip_prefix(other.path.as_str())
                    .is_some_and(|rest| rest.starts_with('/')))
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account, self.path)
    }
}

/// Something that can contain folders: an account root or a folder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// Top level of an account
    Account(String),
    /// A folder
    Folder(FolderId),
}

impl ParentRef {
    /// Account owning this parent
    pub fn account(&self) -> &str {
        match self {
            ParentRef::Account(name) => name,
            ParentRef::Folder(id) => &id.account,
        }
    }

    /// Id a child folder called `name` would get
    pub fn child_id(&self, name: &str) -> FolderId {
        match self {
            ParentRef::Account(account) => FolderId::new(account.clone(), name),
            ParentRef::Folder(id) => id.child(name),
        }
    }

    /// The folder, if this parent is not an account root
    pub fn folder(&self) -> Option<&FolderId> {
        match self {
            ParentRef::Account(_) => None,
            ParentRef::Folder(id) => Some(id),
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Account(name) => write!(f, "{}:", name),
            ParentRef::Folder(id) => write!(f, "{}", id),
        }
    }
}

impl From<FolderId> for ParentRef {
    fn from(id: FolderId) -> Self {
        ParentRef::Folder(id)
    }
}

/// Folder as listed by a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    pub id: FolderId,
    /// Display name
    pub name: String,
    /// Parent folder, `None` for top-level folders
    pub parent: Option<FolderId>,
    pub folder_type: FolderType,
    pub rules: FolderRules,
    pub subscribed: bool,
    /// Number of messages
    pub all_count: u32,
    /// Number of unread messages
    pub unread_count: u32,
}

impl FolderInfo {
    /// Create a folder record, detecting its type from the name
    pub fn new(id: FolderId, parent: Option<FolderId>) -> Self {
        let name = id.name().to_string();
        Self {
            folder_type: FolderType::from_name(&name),
            id,
            name,
            parent,
            rules: FolderRules::empty(),
            subscribed: true,
            all_count: 0,
            unread_count: 0,
        }
    }

    /// Parent as a folder store reference
    pub fn parent_ref(&self) -> ParentRef {
        match &self.parent {
            Some(id) => ParentRef::Folder(id.clone()),
            None => ParentRef::Account(self.id.account.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_type_detection() {
        assert_eq!(FolderType::from_name("INBOX"), FolderType::Inbox);
        assert_eq!(FolderType::from_name("Outbox"), FolderType::Outbox);
        assert_eq!(FolderType::from_name("[Gmail]/Sent Mail"), FolderType::Sent);
        assert_eq!(FolderType::from_name("Deleted Items"), FolderType::Trash);
        assert_eq!(FolderType::from_name("Projects"), FolderType::Normal);
    }

    #[test]
    fn test_folder_id_hierarchy() {
        let parent = FolderId::new("imap", "Work");
        let child = parent.child("Reports");
        assert_eq!(child.path, "Work/Reports");
        assert_eq!(child.name(), "Reports");
        assert!(child.is_within(&parent));
        assert!(parent.is_within(&parent));
        assert!(!FolderId::new("imap", "Workshop").is_within(&parent));
        assert!(!FolderId::new("pop", "Work/Reports").is_within(&parent));
    }

    #[test]
    fn test_parent_ref() {
        let root = ParentRef::Account("local".into());
        assert_eq!(root.child_id("Drafts"), FolderId::new("local", "Drafts"));
        assert!(root.folder().is_none());

        let info = FolderInfo::new(FolderId::new("local", "Drafts"), None);
        assert_eq!(info.folder_type, FolderType::Drafts);
        assert_eq!(info.parent_ref(), root);
    }

    #[test]
    fn test_special_rules() {
        let rules = FolderRules::special();
        assert!(rules.contains(FolderRules::NON_DELETABLE));
        assert!(!rules.contains(FolderRules::NON_WRITABLE));
    }
}
