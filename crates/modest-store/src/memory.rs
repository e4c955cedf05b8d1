//! In-memory store and transport.
//!
//! Backs the device-local folders account and every test. It keeps call
//! counters so callers can check which capabilities an operation reached.

use crate::{
    FolderId, FolderInfo, FolderObserver, FolderRules, FolderType, HeaderId, Message, MessageFlags,
    MessageHeader, ParentRef, Progress, Protocol, SendQueue, Store, StoreError, StoreResult,
    Transport,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Number of times each store capability was invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub create_folder: usize,
    pub remove_folder: usize,
    pub copy_folder: usize,
    pub refresh_folder: usize,
    pub poke_status: usize,
    pub get_message: usize,
    pub add_message: usize,
    pub remove_message: usize,
    pub transfer_messages: usize,
    pub sync_folder: usize,
}

#[derive(Default)]
struct Counters {
    create_folder: AtomicUsize,
    remove_folder: AtomicUsize,
    copy_folder: AtomicUsize,
    refresh_folder: AtomicUsize,
    poke_status: AtomicUsize,
    get_message: AtomicUsize,
    add_message: AtomicUsize,
    remove_message: AtomicUsize,
    transfer_messages: AtomicUsize,
    sync_folder: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

struct FolderEntry {
    info: FolderInfo,
    messages: Vec<Message>,
    /// Messages the "server" has but the client has not seen yet
    arrivals: Vec<Message>,
}

impl FolderEntry {
    fn new(info: FolderInfo) -> Self {
        Self {
            info,
            messages: Vec::new(),
            arrivals: Vec::new(),
        }
    }

    fn update_counts(&mut self) {
        self.info.all_count = self.messages.len() as u32;
        self.info.unread_count = self
            .messages
            .iter()
            .filter(|m| !m.header.flags.seen)
            .count() as u32;
    }
}

#[derive(Default)]
struct MemoryState {
    /// Keyed by folder path
    folders: BTreeMap<String, FolderEntry>,
    last_sync: Option<(FolderId, bool)>,
    expunged: Vec<MessageHeader>,
    /// Messages downloaded by `get_message`, in request order
    fetched: Vec<HeaderId>,
    /// Messages whose body the "server" fails to return
    unavailable: Vec<HeaderId>,
}

impl MemoryState {
    fn entry(&self, id: &FolderId) -> StoreResult<&FolderEntry> {
        self.folders
            .get(&id.path)
            .ok_or_else(|| StoreError::FolderNotFound(id.to_string()))
    }

    fn entry_mut(&mut self, id: &FolderId) -> StoreResult<&mut FolderEntry> {
        self.folders
            .get_mut(&id.path)
            .ok_or_else(|| StoreError::FolderNotFound(id.to_string()))
    }

    /// Paths of `id` and all its descendants, parents first
    fn subtree(&self, id: &FolderId) -> Vec<String> {
        self.folders
            .values()
            .filter(|e| e.info.id.is_within(id))
            .map(|e| e.info.id.path.clone())
            .collect()
    }
}

type RefreshHook = Box<dyn Fn(&FolderId) + Send + Sync>;

/// A complete store kept in memory
pub struct MemoryStore {
    name: String,
    protocol: Protocol,
    state: Mutex<MemoryState>,
    counters: Counters,
    canceled: AtomicBool,
    refresh_hook: Mutex<Option<RefreshHook>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            protocol,
            state: Mutex::new(MemoryState::default()),
            counters: Counters::default(),
            canceled: AtomicBool::new(false),
            refresh_hook: Mutex::new(None),
        }
    }

    /// Create the device-local account with its mandatory folders
    pub fn local_folders(name: impl Into<String>) -> Self {
        let store = Self::new(name, Protocol::Local);
        for (path, folder_type) in [
            ("Outbox", FolderType::Outbox),
            ("Drafts", FolderType::Drafts),
            ("Sent", FolderType::Sent),
            ("Trash", FolderType::Trash),
        ] {
            let mut rules = FolderRules::special();
            if folder_type == FolderType::Outbox {
                rules |= FolderRules::NON_WRITABLE;
            }
            store.insert_folder(path, folder_type, rules);
        }
        store
    }

    /// Add a folder directly (test and setup helper); the parent must exist
    pub fn insert_folder(&self, path: &str, folder_type: FolderType, rules: FolderRules) -> FolderId {
        let id = FolderId::new(self.name.clone(), path);
        let parent = path
            .rsplit_once('/')
            .map(|(parent, _)| FolderId::new(self.name.clone(), parent));
        let mut info = FolderInfo::new(id.clone(), parent);
        info.folder_type = folder_type;
        info.rules = rules;
        lock(&self.state)
            .folders
            .insert(path.to_string(), FolderEntry::new(info));
        id
    }

    /// Mark a folder as not subscribed
    pub fn unsubscribe(&self, id: &FolderId) {
        if let Some(entry) = lock(&self.state).folders.get_mut(&id.path) {
            entry.info.subscribed = false;
        }
    }

    pub fn set_rules(&self, id: &FolderId, rules: FolderRules) {
        if let Some(entry) = lock(&self.state).folders.get_mut(&id.path) {
            entry.info.rules = rules;
        }
    }

    /// Store a message the client already knows about
    pub fn insert_message(&self, folder: &FolderId, mut message: Message) -> MessageHeader {
        message.header.folder = Some(folder.clone());
        let header = message.header.clone();
        let mut state = lock(&self.state);
        if let Some(entry) = state.folders.get_mut(&folder.path) {
            entry.messages.push(message);
            entry.update_counts();
        }
        header
    }

    /// Queue a message on the "server"; the next refresh reports it as new
    pub fn deliver(&self, folder: &FolderId, mut message: Message) -> MessageHeader {
        message.header.folder = Some(folder.clone());
        let header = message.header.clone();
        if let Some(entry) = lock(&self.state).folders.get_mut(&folder.path) {
            entry.arrivals.push(message);
        }
        header
    }

    /// Current copy of a message header, looked up by id
    pub fn find_header(&self, header: &MessageHeader) -> Option<MessageHeader> {
        lock(&self.state)
            .folders
            .values()
            .flat_map(|e| e.messages.iter())
            .find(|m| m.header.id == header.id)
            .map(|m| m.header.clone())
    }

    /// Headers currently held by a folder
    pub fn folder_headers(&self, id: &FolderId) -> Vec<MessageHeader> {
        lock(&self.state)
            .folders
            .get(&id.path)
            .map(|e| e.messages.iter().map(|m| m.header.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_folder(&self, id: &FolderId) -> bool {
        lock(&self.state).folders.contains_key(&id.path)
    }

    /// Last folder synchronised and whether it was expunged
    pub fn last_sync(&self) -> Option<(FolderId, bool)> {
        lock(&self.state).last_sync.clone()
    }

    /// Headers dropped by expunging syncs, with their final flags
    pub fn expunged(&self) -> Vec<MessageHeader> {
        lock(&self.state).expunged.clone()
    }

    /// Make `get_message` fail for this message
    pub fn make_unavailable(&self, header: &MessageHeader) {
        lock(&self.state).unavailable.push(header.id);
    }

    /// Ids of the messages downloaded so far, oldest request first
    pub fn fetched(&self) -> Vec<HeaderId> {
        lock(&self.state).fetched.clone()
    }

    /// Run `hook` after every successful folder refresh
    pub fn on_refresh<F>(&self, hook: F)
    where
        F: Fn(&FolderId) + Send + Sync + 'static,
    {
        *lock(&self.refresh_hook) = Some(Box::new(hook));
    }

    /// Whether `cancel` has been requested and not yet consumed
    pub fn cancel_requested(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> CallStats {
        let c = &self.counters;
        CallStats {
            create_folder: c.create_folder.load(Ordering::SeqCst),
            remove_folder: c.remove_folder.load(Ordering::SeqCst),
            copy_folder: c.copy_folder.load(Ordering::SeqCst),
            refresh_folder: c.refresh_folder.load(Ordering::SeqCst),
            poke_status: c.poke_status.load(Ordering::SeqCst),
            get_message: c.get_message.load(Ordering::SeqCst),
            add_message: c.add_message.load(Ordering::SeqCst),
            remove_message: c.remove_message.load(Ordering::SeqCst),
            transfer_messages: c.transfer_messages.load(Ordering::SeqCst),
            sync_folder: c.sync_folder.load(Ordering::SeqCst),
        }
    }

    fn check_canceled(&self) -> StoreResult<()> {
        if self.canceled.swap(false, Ordering::SeqCst) {
            debug!("{}: request canceled", self.name);
            return Err(StoreError::Canceled);
        }
        Ok(())
    }

    fn check_account(&self, id: &FolderId) -> StoreResult<()> {
        if id.account != self.name {
            return Err(StoreError::Unsupported(format!(
                "{} belongs to another account",
                id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn list_folders(&self, subscribed_only: bool) -> StoreResult<Vec<FolderInfo>> {
        self.check_canceled()?;
        Ok(lock(&self.state)
            .folders
            .values()
            .filter(|e| !subscribed_only || e.info.subscribed)
            .map(|e| e.info.clone())
            .collect())
    }

    async fn create_folder(&self, parent: &ParentRef, name: &str) -> StoreResult<FolderInfo> {
        bump(&self.counters.create_folder);
        self.check_canceled()?;
        let id = parent.child_id(name);
        self.check_account(&id)?;
        let mut state = lock(&self.state);
        if let Some(parent_id) = parent.folder() {
            state.entry(parent_id)?;
        }
        if state.folders.contains_key(&id.path) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        let info = FolderInfo::new(id.clone(), parent.folder().cloned());
        state
            .folders
            .insert(id.path.clone(), FolderEntry::new(info.clone()));
        Ok(info)
    }

    async fn remove_folder(&self, id: &FolderId) -> StoreResult<()> {
        bump(&self.counters.remove_folder);
        self.check_canceled()?;
        let mut state = lock(&self.state);
        state.entry(id)?;
        for path in state.subtree(id) {
            state.folders.remove(&path);
        }
        Ok(())
    }

    async fn copy_folder(
        &self,
        id: &FolderId,
        parent: &ParentRef,
        new_name: &str,
        delete_original: bool,
        progress: Progress<'_>,
    ) -> StoreResult<FolderInfo> {
        bump(&self.counters.copy_folder);
        self.check_canceled()?;
        let new_root = parent.child_id(new_name);
        self.check_account(&new_root)?;

        let mut state = lock(&self.state);
        state.entry(id)?;
        if let Some(parent_id) = parent.folder() {
            state.entry(parent_id)?;
        }
        if state.folders.contains_key(&new_root.path) {
            return Err(StoreError::AlreadyExists(new_root.to_string()));
        }

        let paths = state.subtree(id);
        let total = paths.len() as u32;
        let mut copied = Vec::with_capacity(paths.len());
        for path in &paths {
            let Some(entry) = state.folders.get(path) else {
                continue;
            };
            let suffix = &path[id.path.len()..];
            let new_id = FolderId::new(self.name.clone(), format!("{}{}", new_root.path, suffix));
            let new_parent = if suffix.is_empty() {
                parent.folder().cloned()
            } else {
                new_id
                    .path
                    .rsplit_once('/')
                    .map(|(p, _)| FolderId::new(self.name.clone(), p))
            };
            let mut info = entry.info.clone();
            info.name = new_id.name().to_string();
            info.id = new_id.clone();
            info.parent = new_parent;
            let messages = entry
                .messages
                .iter()
                .cloned()
                .map(|mut m| {
                    m.header.folder = Some(new_id.clone());
                    m
                })
                .collect();
            copied.push((
                new_id.path.clone(),
                FolderEntry {
                    info,
                    messages,
                    arrivals: Vec::new(),
                },
            ));
        }
        if delete_original {
            for path in &paths {
                state.folders.remove(path);
            }
        }
        let mut result = None;
        for (position, (path, entry)) in copied.into_iter().enumerate() {
            if result.is_none() {
                result = Some(entry.info.clone());
            }
            state.folders.insert(path, entry);
            progress(position as u32 + 1, total);
        }
        result.ok_or_else(|| StoreError::FolderNotFound(id.to_string()))
    }

    async fn refresh_folder(
        &self,
        id: &FolderId,
        observer: &dyn FolderObserver,
    ) -> StoreResult<()> {
        bump(&self.counters.refresh_folder);
        self.check_canceled()?;
        let new_headers: Vec<MessageHeader> = {
            let mut state = lock(&self.state);
            let entry = state.entry_mut(id)?;
            let arrivals = std::mem::take(&mut entry.arrivals);
            let headers = arrivals.iter().map(|m| m.header.clone()).collect();
            entry.messages.extend(arrivals);
            entry.update_counts();
            headers
        };
        if !new_headers.is_empty() {
            observer.headers_added(&new_headers);
        }
        if let Some(hook) = lock(&self.refresh_hook).as_ref() {
            hook(id);
        }
        Ok(())
    }

    async fn poke_status(&self, id: &FolderId) -> StoreResult<FolderInfo> {
        bump(&self.counters.poke_status);
        self.check_canceled()?;
        let state = lock(&self.state);
        let entry = state.entry(id)?;
        let mut info = entry.info.clone();
        info.all_count += entry.arrivals.len() as u32;
        Ok(info)
    }

    async fn headers(&self, id: &FolderId) -> StoreResult<Vec<MessageHeader>> {
        let state = lock(&self.state);
        Ok(state
            .entry(id)?
            .messages
            .iter()
            .map(|m| m.header.clone())
            .collect())
    }

    async fn get_message(&self, header: &MessageHeader) -> StoreResult<Message> {
        bump(&self.counters.get_message);
        self.check_canceled()?;
        let folder = header
            .folder
            .as_ref()
            .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
        let mut state = lock(&self.state);
        if state.unavailable.contains(&header.id) {
            return Err(StoreError::Backend(format!("body of {} unavailable", header.id)));
        }
        let entry = state.entry_mut(folder)?;
        let message = entry
            .messages
            .iter_mut()
            .find(|m| m.header.id == header.id)
            .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
        message.header.flags.cached = true;
        let message = message.clone();
        state.fetched.push(header.id);
        Ok(message)
    }

    async fn add_message(&self, folder: &FolderId, mut message: Message) -> StoreResult<MessageHeader> {
        bump(&self.counters.add_message);
        self.check_canceled()?;
        let mut state = lock(&self.state);
        let entry = state.entry_mut(folder)?;
        if entry.info.rules.contains(FolderRules::NON_WRITABLE) {
            return Err(StoreError::NotPermitted(format!("{} is read-only", folder)));
        }
        message.header.folder = Some(folder.clone());
        let header = message.header.clone();
        entry.messages.push(message);
        entry.update_counts();
        Ok(header)
    }

    async fn remove_message(&self, header: &MessageHeader) -> StoreResult<()> {
        bump(&self.counters.remove_message);
        self.check_canceled()?;
        let folder = header
            .folder
            .as_ref()
            .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
        let mut state = lock(&self.state);
        let entry = state.entry_mut(folder)?;
        let message = entry
            .messages
            .iter_mut()
            .find(|m| m.header.id == header.id)
            .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
        message.header.flags.deleted = true;
        Ok(())
    }

    async fn set_flags(&self, header: &MessageHeader, flags: MessageFlags) -> StoreResult<()> {
        let folder = header
            .folder
            .as_ref()
            .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
        let mut state = lock(&self.state);
        let entry = state.entry_mut(folder)?;
        let message = entry
            .messages
            .iter_mut()
            .find(|m| m.header.id == header.id)
            .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
        message.header.flags = flags;
        entry.update_counts();
        Ok(())
    }

    async fn sync_folder(&self, id: &FolderId, expunge: bool) -> StoreResult<()> {
        bump(&self.counters.sync_folder);
        self.check_canceled()?;
        let mut state = lock(&self.state);
        let entry = state.entry_mut(id)?;
        let mut dropped: Vec<Message> = Vec::new();
        if expunge {
            let (deleted, kept): (Vec<Message>, Vec<Message>) = std::mem::take(&mut entry.messages)
                .into_iter()
                .partition(|m| m.header.flags.deleted);
            entry.messages = kept;
            entry.update_counts();
            dropped = deleted;
        }
        state.expunged.extend(dropped.into_iter().map(|m| m.header));
        state.last_sync = Some((id.clone(), expunge));
        Ok(())
    }

    async fn transfer_messages(
        &self,
        headers: &[MessageHeader],
        dest: &FolderId,
        delete_original: bool,
        progress: Progress<'_>,
    ) -> StoreResult<Vec<MessageHeader>> {
        bump(&self.counters.transfer_messages);
        self.check_canceled()?;
        self.check_account(dest)?;
        let total = headers.len() as u32;
        let mut transferred = Vec::with_capacity(headers.len());
        for (position, header) in headers.iter().enumerate() {
            let mut state = lock(&self.state);
            let source = header
                .folder
                .as_ref()
                .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
            let entry = state.entry_mut(source)?;
            let index = entry
                .messages
                .iter()
                .position(|m| m.header.id == header.id)
                .ok_or_else(|| StoreError::MessageNotFound(header.id.to_string()))?;
            let mut message = if delete_original {
                entry.messages.remove(index)
            } else {
                let mut copy = entry.messages[index].clone();
                copy.header.id = Default::default();
                copy
            };
            entry.update_counts();
            message.header.folder = Some(dest.clone());
            let dest_entry = state.entry_mut(dest)?;
            transferred.push(message.header.clone());
            dest_entry.messages.push(message);
            dest_entry.update_counts();
            drop(state);
            progress(position as u32 + 1, total);
        }
        Ok(transferred)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    fn clear_cancel(&self) {
        if self.canceled.swap(false, Ordering::SeqCst) {
            debug!("{}: dropped unused cancel request", self.name);
        }
    }
}

/// Send queue that records what it was given
#[derive(Default)]
pub struct MemorySendQueue {
    queued: Mutex<Vec<Message>>,
    sent: Mutex<Vec<Message>>,
    flushes: AtomicUsize,
}

impl MemorySendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting for the next flush
    pub fn queued(&self) -> Vec<Message> {
        lock(&self.queued).clone()
    }

    /// Messages delivered by previous flushes
    pub fn sent(&self) -> Vec<Message> {
        lock(&self.sent).clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SendQueue for MemorySendQueue {
    async fn add(&self, message: Message) -> StoreResult<()> {
        lock(&self.queued).push(message);
        Ok(())
    }

    async fn flush(&self) -> StoreResult<()> {
        bump(&self.flushes);
        let delivered = std::mem::take(&mut *lock(&self.queued));
        lock(&self.sent).extend(delivered);
        Ok(())
    }
}

/// Transport account with an optional in-memory send queue
pub struct MemoryTransport {
    name: String,
    queue: Option<Arc<MemorySendQueue>>,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Some(Arc::new(MemorySendQueue::new())),
        }
    }

    /// A transport whose send queue could not be created
    pub fn without_queue(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: None,
        }
    }

    pub fn queue(&self) -> Option<Arc<MemorySendQueue>> {
        self.queue.clone()
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_queue(&self) -> Option<Arc<dyn SendQueue>> {
        self.queue
            .clone()
            .map(|queue| queue as Arc<dyn SendQueue>)
    }
}
