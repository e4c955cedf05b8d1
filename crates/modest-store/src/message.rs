//! Message header and message types

use crate::FolderId;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Email message flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags {
    /// Message has been read
    pub seen: bool,
    /// Message has been answered
    pub answered: bool,
    /// Message is flagged/starred
    pub flagged: bool,
    /// Message is marked for deletion
    pub deleted: bool,
    /// Message is a draft
    pub draft: bool,
    /// Full body has been downloaded to the local cache
    pub cached: bool,
}

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }

    /// Format as "Name <address>" or just "address"
    pub fn to_display_string(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.address),
            _ => self.address.clone(),
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// Store-assigned identity of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderId(Uuid);

impl HeaderId {
    pub fn new() -> Self {
        HeaderId(Uuid::new_v4())
    }
}

impl Default for HeaderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of a message as kept by its folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: HeaderId,
    /// Owning folder, `None` once the header has been detached from it
    pub folder: Option<FolderId>,
    /// Server-assigned UID
    pub uid: String,
    /// Message-ID header
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    /// Date sent
    pub date_sent: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
    pub flags: MessageFlags,
}

impl MessageHeader {
    /// Create a header for a message of `size` bytes inside `folder`
    pub fn new(folder: FolderId, uid: impl Into<String>, size: u64) -> Self {
        Self {
            id: HeaderId::new(),
            folder: Some(folder),
            uid: uid.into(),
            message_id: None,
            subject: None,
            from: None,
            to: Vec::new(),
            date_sent: Utc::now(),
            size,
            flags: MessageFlags::default(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date_sent = date;
        self
    }

    /// Get the subject, with a default for empty
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("(No subject)")
    }
}

/// A full message: its header plus the raw RFC 5322 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub raw: Vec<u8>,
}

impl Message {
    pub fn new(header: MessageHeader, raw: Vec<u8>) -> Self {
        Self { header, raw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        let named = EmailAddress::new(Some("John Doe".into()), "john@example.com");
        assert_eq!(named.to_string(), "John Doe <john@example.com>");
        let bare = EmailAddress::new(Some(String::new()), "john@example.com");
        assert_eq!(bare.to_string(), "john@example.com");
    }

    #[test]
    fn test_header_defaults() {
        let header = MessageHeader::new(FolderId::new("imap", "INBOX"), "42", 1024);
        assert_eq!(header.subject(), "(No subject)");
        assert!(!header.flags.seen);
        assert_ne!(header.id, MessageHeader::new(FolderId::new("imap", "INBOX"), "42", 1).id);
    }
}
