//! Shared application state handed to every mail operation

use crate::{
    AccountRegistry, ConfStore, ErrorHandler, IdleLoop, IdleSender, MailOperation,
    MailOperationQueue, MailSettings, OperationKind, OperationSource,
};
use std::sync::{Arc, PoisonError, RwLock};

/// Accounts, settings, account-state store, UI dispatch and the queue of
/// running operations
pub struct AppContext {
    accounts: AccountRegistry,
    conf: Arc<dyn ConfStore>,
    settings: RwLock<MailSettings>,
    idle: IdleSender,
    queue: MailOperationQueue,
}

impl AppContext {
    /// Create the context
    ///
    /// Returns the context and the loop the UI thread must keep dispatching
    pub fn new(
        accounts: AccountRegistry,
        conf: Arc<dyn ConfStore>,
        settings: MailSettings,
    ) -> (Arc<Self>, IdleLoop) {
        let (idle, idle_loop) = IdleLoop::new();
        let ctx = Arc::new(Self {
            accounts,
            conf,
            settings: RwLock::new(settings),
            idle,
            queue: MailOperationQueue::new(),
        });
        (ctx, idle_loop)
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn conf(&self) -> &Arc<dyn ConfStore> {
        &self.conf
    }

    pub fn settings(&self) -> MailSettings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_settings(&self, settings: MailSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn idle(&self) -> &IdleSender {
        &self.idle
    }

    pub fn queue(&self) -> &MailOperationQueue {
        &self.queue
    }

    /// Create an operation and register it with the queue
    pub fn new_operation(
        self: &Arc<Self>,
        kind: OperationKind,
        source: Option<&OperationSource>,
    ) -> MailOperation {
        let op = MailOperation::new(self.clone(), kind, source);
        self.queue.add(&op);
        op
    }

    /// Like [`AppContext::new_operation`], with `handler` run if the
    /// operation does not succeed
    pub fn new_operation_with_error_handler(
        self: &Arc<Self>,
        kind: OperationKind,
        source: Option<&OperationSource>,
        handler: ErrorHandler,
    ) -> MailOperation {
        let op = MailOperation::with_error_handler(self.clone(), kind, source, handler);
        self.queue.add(&op);
        op
    }
}
