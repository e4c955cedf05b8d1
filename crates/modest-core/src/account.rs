//! Account management

use crate::AccountSettings;
use modest_store::{MemoryStore, Store, Transport};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Name of the built-in device-local account
pub const LOCAL_FOLDERS_ACCOUNT: &str = "local_folders";

/// A configured account: its store, the transport used to send on its
/// behalf, and its settings
#[derive(Clone)]
pub struct Account {
    pub settings: AccountSettings,
    pub store: Arc<dyn Store>,
    pub transport: Option<Arc<dyn Transport>>,
}

impl Account {
    pub fn new(settings: AccountSettings, store: Arc<dyn Store>) -> Self {
        Self {
            settings,
            store,
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("settings", &self.settings)
            .field("store", &self.store.name())
            .field("transport", &self.transport.as_ref().map(|t| t.name()))
            .finish()
    }
}

/// Every account the application knows about, plus the local folders
pub struct AccountRegistry {
    accounts: RwLock<HashMap<String, Account>>,
    local_folders: Arc<dyn Store>,
}

impl AccountRegistry {
    /// Registry whose local folders live in memory
    pub fn new() -> Self {
        Self::with_local_folders(Arc::new(MemoryStore::local_folders(LOCAL_FOLDERS_ACCOUNT)))
    }

    pub fn with_local_folders(local_folders: Arc<dyn Store>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            local_folders,
        }
    }

    /// Register (or replace) an account
    pub fn add(&self, account: Account) {
        info!("Registering account {}", account.name());
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.name().to_string(), account);
    }

    pub fn remove(&self, name: &str) -> Option<Account> {
        debug!("Removing account {}", name);
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Store of an account, including the local folders
    pub fn store(&self, name: &str) -> Option<Arc<dyn Store>> {
        if name == self.local_folders.name() {
            return Some(self.local_folders.clone());
        }
        self.get(name).map(|account| account.store)
    }

    pub fn transport(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.get(name).and_then(|account| account.transport)
    }

    pub fn local_folders(&self) -> Arc<dyn Store> {
        self.local_folders.clone()
    }

    pub fn is_local_folders(&self, name: &str) -> bool {
        name == self.local_folders.name()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modest_store::{MemoryTransport, Protocol};

    #[test]
    fn test_registry_lookup() {
        let registry = AccountRegistry::new();
        let store = Arc::new(MemoryStore::new("work", Protocol::Imap));
        registry.add(
            Account::new(AccountSettings::new("work"), store)
                .with_transport(Arc::new(MemoryTransport::new("work-smtp"))),
        );

        assert!(registry.store("work").is_some());
        assert_eq!(registry.transport("work").unwrap().name(), "work-smtp");
        assert!(registry.store(LOCAL_FOLDERS_ACCOUNT).is_some());
        assert!(registry.is_local_folders(LOCAL_FOLDERS_ACCOUNT));
        assert!(registry.store("missing").is_none());
        assert_eq!(registry.names(), vec!["work"]);

        assert!(registry.remove("work").is_some());
        assert!(registry.get("work").is_none());
    }
}
