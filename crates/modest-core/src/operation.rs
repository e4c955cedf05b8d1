//! The mail operation: one asynchronous, cancellable task with observable
//! status and progress.
//!
//! A driver method (see the `ops` modules) validates its arguments on the
//! calling thread, then hands the library work to a dedicated worker thread.
//! Every state change a UI might observe is delivered through the context's
//! idle queue as an immutable [`StateSnapshot`], and every operation ends
//! with exactly one end notification, which is always the last one its
//! observers see.

use crate::{AppContext, CoreError, CoreResult};
use modest_store::Store;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Object on whose behalf an operation runs (a window, a view...)
pub type OperationSource = Arc<dyn Any + Send + Sync>;

/// Called on the UI thread with each state snapshot
pub type ProgressHandler = Arc<dyn Fn(&MailOperation, &StateSnapshot) + Send + Sync>;

/// Called once, on the UI thread, when an operation ends without success
pub type ErrorHandler = Box<dyn FnOnce(&MailOperation) + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What an operation does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    UpdateAccount,
    SendMail,
    CreateMsg,
    SaveToDrafts,
    CreateFolder,
    RemoveFolder,
    RenameFolder,
    TransferFolder,
    GetMsg,
    GetMsgsFull,
    RemoveMsg,
    TransferMsgs,
    RefreshFolder,
    GetMimePartSize,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::UpdateAccount => "update-account",
            OperationKind::SendMail => "send-mail",
            OperationKind::CreateMsg => "create-msg",
            OperationKind::SaveToDrafts => "save-to-drafts",
            OperationKind::CreateFolder => "create-folder",
            OperationKind::RemoveFolder => "remove-folder",
            OperationKind::RenameFolder => "rename-folder",
            OperationKind::TransferFolder => "transfer-folder",
            OperationKind::GetMsg => "get-msg",
            OperationKind::GetMsgsFull => "get-msgs-full",
            OperationKind::RemoveMsg => "remove-msg",
            OperationKind::TransferMsgs => "transfer-msgs",
            OperationKind::RefreshFolder => "refresh-folder",
            OperationKind::GetMimePartSize => "get-mime-part-size",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    /// Created, not started yet
    Invalid,
    InProgress,
    Success,
    Failed,
    Canceled,
    /// Some items of a batch failed, at least one succeeded
    FinishedWithErrors,
}

impl OperationStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, OperationStatus::Invalid | OperationStatus::InProgress)
    }
}

/// State of an operation at one instant, as delivered to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub kind: OperationKind,
    pub status: OperationStatus,
    /// Tasks done; 0 with `total` 0 means "not tracked"
    pub done: u32,
    pub total: u32,
    /// Byte counts for a single large transfer, 0 when not tracked
    pub bytes_done: u64,
    pub bytes_total: u64,
    /// Set only on the end notification
    pub finished: bool,
}

/// Identifies a connected progress handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct State {
    status: OperationStatus,
    error: Option<CoreError>,
    done: u32,
    total: u32,
    bytes_done: u64,
    bytes_total: u64,
    account: Option<String>,
    store: Option<Arc<dyn Store>>,
    ended: bool,
}

struct Inner {
    id: Uuid,
    kind: OperationKind,
    ctx: Arc<AppContext>,
    source: Option<Weak<dyn Any + Send + Sync>>,
    state: Mutex<State>,
    handlers: Mutex<Vec<(HandlerId, ProgressHandler)>>,
    next_handler: AtomicU64,
    error_handler: Mutex<Option<ErrorHandler>>,
}

/// Handle to a mail operation. Clones refer to the same operation.
#[derive(Clone)]
pub struct MailOperation {
    inner: Arc<Inner>,
}

/// Handle that does not keep the operation, or its context, alive
#[derive(Clone)]
pub(crate) struct WeakMailOperation(Weak<Inner>);

impl WeakMailOperation {
    pub(crate) fn upgrade(&self) -> Option<MailOperation> {
        self.0.upgrade().map(|inner| MailOperation { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn refers_to(&self, op: &MailOperation) -> bool {
        Weak::as_ptr(&self.0) == Arc::as_ptr(&op.inner)
    }
}

impl MailOperation {
    /// Create an operation that is not yet registered with the queue.
    /// Most callers want [`AppContext::new_operation`].
    pub fn new(ctx: Arc<AppContext>, kind: OperationKind, source: Option<&OperationSource>) -> Self {
        let op = Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                kind,
                ctx,
                source: source.map(Arc::downgrade),
                state: Mutex::new(State {
                    status: OperationStatus::Invalid,
                    error: None,
                    done: 0,
                    total: 0,
                    bytes_done: 0,
                    bytes_total: 0,
                    account: None,
                    store: None,
                    ended: false,
                }),
                handlers: Mutex::new(Vec::new()),
                next_handler: AtomicU64::new(1),
                error_handler: Mutex::new(None),
            }),
        };
        debug!("Created {} operation {}", kind, op.inner.id);
        op
    }

    /// Like [`MailOperation::new`], with `handler` run if the operation does
    /// not end in success
    pub fn with_error_handler(
        ctx: Arc<AppContext>,
        kind: OperationKind,
        source: Option<&OperationSource>,
        handler: ErrorHandler,
    ) -> Self {
        let op = Self::new(ctx, kind, source);
        *lock(&op.inner.error_handler) = Some(handler);
        op
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> OperationKind {
        self.inner.kind
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.inner.ctx
    }

    pub(crate) fn downgrade(&self) -> WeakMailOperation {
        WeakMailOperation(Arc::downgrade(&self.inner))
    }

    pub fn status(&self) -> OperationStatus {
        lock(&self.inner.state).status
    }

    pub fn error(&self) -> Option<CoreError> {
        lock(&self.inner.state).error.clone()
    }

    pub fn task_done(&self) -> u32 {
        lock(&self.inner.state).done
    }

    pub fn task_total(&self) -> u32 {
        lock(&self.inner.state).total
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    pub fn is_canceled(&self) -> bool {
        self.status() == OperationStatus::Canceled
    }

    /// The requesting object, if it is still alive
    pub fn source(&self) -> Option<OperationSource> {
        self.inner.source.as_ref().and_then(Weak::upgrade)
    }

    /// Whether `candidate` is the object this operation was created for
    pub fn is_mine(&self, candidate: &OperationSource) -> bool {
        self.inner
            .source
            .as_ref()
            .is_some_and(|source| Weak::as_ptr(source).cast::<()>() == Arc::as_ptr(candidate).cast::<()>())
    }

    /// Name of the account the operation acts on, once known
    pub fn account_name(&self) -> Option<String> {
        lock(&self.inner.state).account.clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let state = lock(&self.inner.state);
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &State) -> StateSnapshot {
        StateSnapshot {
            kind: self.inner.kind,
            status: state.status,
            done: state.done,
            total: state.total,
            bytes_done: state.bytes_done,
            bytes_total: state.bytes_total,
            finished: state.ended && state.status.is_finished(),
        }
    }

    /// Request cancellation.
    ///
    /// Returns false, doing nothing, if the operation already finished.
    pub fn cancel(&self) -> bool {
        let mut state = lock(&self.inner.state);
        if state.status.is_finished() {
            return false;
        }
        state.status = OperationStatus::Canceled;
        state.error = Some(CoreError::OperationCanceled);
        info!("Canceling {} operation {}", self.inner.kind, self.inner.id);
        // Under the state lock so the request cannot land after notify_end
        // has cleared it
        if let Some(ref store) = state.store {
            store.cancel();
        }
        true
    }

    /// Observe every snapshot, delivered on the UI thread
    pub fn connect_progress_changed<F>(&self, f: F) -> HandlerId
    where
        F: Fn(&MailOperation, &StateSnapshot) + Send + Sync + 'static,
    {
        let id = HandlerId(self.inner.next_handler.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.handlers).push((id, Arc::new(f)));
        id
    }

    pub fn disconnect(&self, id: HandlerId) {
        lock(&self.inner.handlers).retain(|(handler_id, _)| *handler_id != id);
    }

    // Driver side

    /// Mark the operation as running and tell observers
    pub(crate) fn start(&self) {
        let snapshot = {
            let mut state = lock(&self.inner.state);
            if state.status != OperationStatus::Invalid {
                return;
            }
            state.status = OperationStatus::InProgress;
            self.snapshot_of(&state)
        };
        debug!("Started {} operation {}", self.inner.kind, self.inner.id);
        self.emit(snapshot);
    }

    /// Tie the operation to an account. The first call wins; the account is
    /// marked busy until the end notification.
    pub(crate) fn set_account(&self, name: &str, store: Option<Arc<dyn Store>>) {
        {
            let mut state = lock(&self.inner.state);
            if let Some(ref current) = state.account {
                if current != name {
                    warn!(
                        "{} operation {} already bound to {}, ignoring {}",
                        self.inner.kind, self.inner.id, current, name
                    );
                }
                return;
            }
            state.account = Some(name.to_string());
            state.store = store;
        }
        if let Err(e) = self.inner.ctx.conf().set_busy(name, true) {
            warn!("Failed to mark account {} busy: {}", name, e);
        }
    }

    pub(crate) fn update_progress(&self, done: u32, total: u32) {
        let snapshot = {
            let mut state = lock(&self.inner.state);
            if state.ended || state.status.is_finished() {
                return;
            }
            state.total = total;
            state.done = if total > 0 { done.min(total) } else { done };
            self.snapshot_of(&state)
        };
        self.emit(snapshot);
    }

    pub(crate) fn update_bytes(&self, done: u64, total: u64) {
        let snapshot = {
            let mut state = lock(&self.inner.state);
            if state.ended || state.status.is_finished() {
                return;
            }
            state.bytes_total = total;
            state.bytes_done = if total > 0 { done.min(total) } else { done };
            self.snapshot_of(&state)
        };
        self.emit(snapshot);
    }

    /// Set the terminal status. A status that is already terminal (e.g. a
    /// cancellation) is kept.
    pub(crate) fn finish_with(&self, status: OperationStatus, error: Option<CoreError>) {
        let mut state = lock(&self.inner.state);
        if state.status.is_finished() {
            debug!(
                "{} operation {} already {:?}, not setting {:?}",
                self.inner.kind, self.inner.id, state.status, status
            );
            return;
        }
        state.status = status;
        state.error = error;
    }

    pub(crate) fn succeed(&self) {
        self.finish_with(OperationStatus::Success, None);
    }

    /// Record `err`; cancellations become [`OperationStatus::Canceled`]
    pub(crate) fn fail(&self, err: CoreError) {
        if err.is_canceled() {
            self.finish_with(OperationStatus::Canceled, Some(err));
        } else {
            error!("{} operation {} failed: {}", self.inner.kind, self.inner.id, err);
            self.finish_with(OperationStatus::Failed, Some(err));
        }
    }

    pub(crate) fn finish(&self, result: CoreResult<()>) {
        match result {
            Ok(()) => self.succeed(),
            Err(e) => self.fail(e),
        }
    }

    /// Fail during validation on the calling thread and end right away
    pub(crate) fn fail_now(&self, err: CoreError) {
        self.fail(err);
        self.notify_end();
    }

    /// Queue the end notification. Runs once per operation; later calls and
    /// later progress reports are ignored.
    pub(crate) fn notify_end(&self) {
        {
            let mut state = lock(&self.inner.state);
            if state.ended {
                warn!("{} operation {} ended twice", self.inner.kind, self.inner.id);
                return;
            }
            state.ended = true;
            if !state.status.is_finished() {
                warn!("{} operation {} ended without a result", self.inner.kind, self.inner.id);
                state.status = OperationStatus::Failed;
                state.error = Some(CoreError::Store("operation ended without a result".into()));
            }
            if state.status == OperationStatus::Canceled {
                // A cancel that arrived after the last store call is still
                // pending on the account
                if let Some(ref store) = state.store {
                    store.clear_cancel();
                }
            }
        }
        self.idle(|op| op.end_on_ui_thread());
    }

    fn end_on_ui_thread(&self) {
        let (account, snapshot) = {
            let state = lock(&self.inner.state);
            (state.account.clone(), self.snapshot_of(&state))
        };
        if let Some(account) = account {
            if let Err(e) = self.inner.ctx.conf().set_busy(&account, false) {
                warn!("Failed to clear busy flag of {}: {}", account, e);
            }
        }
        if snapshot.status != OperationStatus::Success {
            let handler = lock(&self.inner.error_handler).take();
            if let Some(handler) = handler {
                handler(self);
            }
        }
        info!(
            "{} operation {} finished: {:?}",
            self.inner.kind, self.inner.id, snapshot.status
        );
        self.fire(&snapshot);
        self.inner.ctx.queue().remove(self);
    }

    fn emit(&self, snapshot: StateSnapshot) {
        self.idle(move |op| op.fire(&snapshot));
    }

    fn fire(&self, snapshot: &StateSnapshot) {
        let handlers: Vec<ProgressHandler> = lock(&self.inner.handlers)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(self, snapshot);
        }
    }

    /// Run `f` with this operation on the UI thread
    pub(crate) fn idle<F>(&self, f: F)
    where
        F: FnOnce(&MailOperation) + Send + 'static,
    {
        let op = self.clone();
        self.inner.ctx.idle().idle_add(move || f(&op));
    }

    /// Run `f` on a dedicated worker thread. If the thread cannot be
    /// created the operation fails and ends.
    pub(crate) fn spawn<F>(&self, f: F)
    where
        F: FnOnce(MailOperation) + Send + 'static,
    {
        let op = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("modest-{}", self.inner.kind))
            .spawn(move || f(op));
        if let Err(e) = spawned {
            self.fail_now(CoreError::InstanceCreationFailed(format!("worker thread: {}", e)));
        }
    }
}

impl PartialEq for MailOperation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MailOperation {}

impl fmt::Debug for MailOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("MailOperation")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("status", &state.status)
            .field("done", &state.done)
            .field("total", &state.total)
            .field("account", &state.account)
            .finish()
    }
}
