//! Account settings and the persistent account state written by operations

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What an account update downloads after refreshing folders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrieveType {
    /// Only folder status; nothing is downloaded
    #[default]
    HeadersOnly,
    /// Full messages
    Messages,
    MessagesAndAttachments,
}

impl RetrieveType {
    pub fn downloads_messages(&self) -> bool {
        !matches!(self, RetrieveType::HeadersOnly)
    }
}

/// Per-account configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Account name, as used by the store and transport
    pub name: String,
    /// Display name shown in the UI
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub retrieve_type: RetrieveType,
    /// Maximum number of new messages per update, 0 for no limit
    #[serde(default)]
    pub retrieve_limit: usize,
}

impl AccountSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            retrieve_type: RetrieveType::default(),
            retrieve_limit: 0,
        }
    }

    pub fn with_retrieve(mut self, retrieve_type: RetrieveType, limit: usize) -> Self {
        self.retrieve_type = retrieve_type;
        self.retrieve_limit = limit;
        self
    }

    /// Retrieve limit with 0 mapped to "unlimited"
    pub fn effective_retrieve_limit(&self) -> usize {
        if self.retrieve_limit == 0 {
            usize::MAX
        } else {
            self.retrieve_limit
        }
    }
}

/// Application-wide mail settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    /// Largest message downloaded automatically, in kilobytes; 0 for no limit
    #[serde(default)]
    pub msg_size_limit_kb: u64,
}

impl MailSettings {
    pub fn with_size_limit_kb(kb: u64) -> Self {
        Self { msg_size_limit_kb: kb }
    }

    /// Size limit in bytes, `u64::MAX` when unlimited
    pub fn size_limit_bytes(&self) -> u64 {
        if self.msg_size_limit_kb == 0 {
            u64::MAX
        } else {
            self.msg_size_limit_kb.saturating_mul(1024)
        }
    }
}

/// State kept per account between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub busy: bool,
}

/// Where operations record account state
pub trait ConfStore: Send + Sync {
    fn set_last_updated(&self, account: &str, when: DateTime<Utc>) -> CoreResult<()>;

    /// Mark an account as having an operation in flight
    fn set_busy(&self, account: &str, busy: bool) -> CoreResult<()>;

    fn account_state(&self, account: &str) -> AccountState;

    fn last_updated(&self, account: &str) -> Option<DateTime<Utc>> {
        self.account_state(account).last_updated
    }

    fn is_busy(&self, account: &str) -> bool {
        self.account_state(account).busy
    }
}

/// Account state held in memory only
#[derive(Default)]
pub struct MemoryConf {
    accounts: Mutex<HashMap<String, AccountState>>,
}

impl MemoryConf {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfStore for MemoryConf {
    fn set_last_updated(&self, account: &str, when: DateTime<Utc>) -> CoreResult<()> {
        lock(&self.accounts)
            .entry(account.to_string())
            .or_default()
            .last_updated = Some(when);
        Ok(())
    }

    fn set_busy(&self, account: &str, busy: bool) -> CoreResult<()> {
        lock(&self.accounts).entry(account.to_string()).or_default().busy = busy;
        Ok(())
    }

    fn account_state(&self, account: &str) -> AccountState {
        lock(&self.accounts).get(account).cloned().unwrap_or_default()
    }
}

/// Account state persisted as a JSON document
pub struct JsonConf {
    path: PathBuf,
    accounts: Mutex<HashMap<String, AccountState>>,
}

impl JsonConf {
    /// Open (or start) the state file at `path`
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let accounts = if path.exists() {
            let data = std::fs::read(&path)?;
            serde_json::from_slice(&data)?
        } else {
            HashMap::new()
        };
        debug!("Opened account state at {:?}", path);
        Ok(Self {
            path,
            accounts: Mutex::new(accounts),
        })
    }

    fn save(&self, accounts: &HashMap<String, AccountState>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(accounts)?;
        std::fs::write(&self.path, data)
            .map_err(|e| CoreError::Config(format!("{}: {}", self.path.display(), e)))
    }

    fn update(&self, account: &str, f: impl FnOnce(&mut AccountState)) -> CoreResult<()> {
        let mut accounts = lock(&self.accounts);
        f(accounts.entry(account.to_string()).or_default());
        self.save(&accounts)
    }
}

impl ConfStore for JsonConf {
    fn set_last_updated(&self, account: &str, when: DateTime<Utc>) -> CoreResult<()> {
        self.update(account, |state| state.last_updated = Some(when))
    }

    fn set_busy(&self, account: &str, busy: bool) -> CoreResult<()> {
        self.update(account, |state| state.busy = busy)
    }

    fn account_state(&self, account: &str) -> AccountState {
        lock(&self.accounts).get(account).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(MailSettings::default().size_limit_bytes(), u64::MAX);
        assert_eq!(MailSettings::with_size_limit_kb(10).size_limit_bytes(), 10 * 1024);
        let account = AccountSettings::new("imap");
        assert_eq!(account.effective_retrieve_limit(), usize::MAX);
        let account = account.with_retrieve(RetrieveType::Messages, 5);
        assert_eq!(account.effective_retrieve_limit(), 5);
        assert!(account.retrieve_type.downloads_messages());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let account: AccountSettings = serde_json::from_str(r#"{"name":"work"}"#).unwrap();
        assert_eq!(account.retrieve_type, RetrieveType::HeadersOnly);
        assert_eq!(account.retrieve_limit, 0);

        let account: AccountSettings =
            serde_json::from_str(r#"{"name":"work","retrieve_type":"messages-and-attachments"}"#)
                .unwrap();
        assert_eq!(account.retrieve_type, RetrieveType::MessagesAndAttachments);
    }

    #[test]
    fn test_memory_conf() {
        let conf = MemoryConf::new();
        assert!(!conf.is_busy("imap"));
        conf.set_busy("imap", true).unwrap();
        assert!(conf.is_busy("imap"));
        assert_eq!(conf.last_updated("imap"), None);
    }

    #[test]
    fn test_json_conf_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("accounts.json");
        let when = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();

        let conf = JsonConf::open(&path).unwrap();
        conf.set_last_updated("imap", when).unwrap();
        conf.set_busy("imap", true).unwrap();
        drop(conf);

        let reopened = JsonConf::open(&path).unwrap();
        assert_eq!(reopened.last_updated("imap"), Some(when));
        assert!(reopened.is_busy("imap"));
        assert_eq!(reopened.account_state("pop"), AccountState::default());
    }
}
