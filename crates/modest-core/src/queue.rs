//! Registry of running operations, so views can find, observe and cancel
//! the work they started

use crate::operation::WeakMailOperation;
use crate::{MailOperation, OperationSource};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Change to the set of queued operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    Added,
    Removed,
}

type QueueHandler = Arc<dyn Fn(QueueEvent, &MailOperation) + Send + Sync>;

/// Operations in creation order.
///
/// An operation leaves the queue at its end notification or when removed
/// explicitly; removing an unfinished operation cancels it. Entries do not
/// own their operation, so one whose handles have all been dropped is gone
/// too. Queue-changed handlers run synchronously on the thread that changed
/// the queue.
#[derive(Default)]
pub struct MailOperationQueue {
    ops: Mutex<Vec<WeakMailOperation>>,
    handlers: Mutex<Vec<QueueHandler>>,
}

impl MailOperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, op: &MailOperation) {
        {
            let mut ops = lock(&self.ops);
            ops.retain(WeakMailOperation::is_alive);
            if ops.iter().any(|queued| queued.refers_to(op)) {
                return;
            }
            ops.push(op.downgrade());
        }
        debug!("Queued {} operation {}", op.kind(), op.id());
        self.notify(QueueEvent::Added, op);
    }

    /// Remove `op`, canceling it first if it is still running
    pub fn remove(&self, op: &MailOperation) -> bool {
        let removed = {
            let mut ops = lock(&self.ops);
            let found = ops.iter().any(|queued| queued.refers_to(op));
            ops.retain(|queued| queued.is_alive() && !queued.refers_to(op));
            found
        };
        if !removed {
            return false;
        }
        if !op.is_finished() {
            op.cancel();
        }
        debug!("Dequeued {} operation {}", op.kind(), op.id());
        self.notify(QueueEvent::Removed, op);
        true
    }

    pub fn num_elements(&self) -> usize {
        self.operations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Every queued operation
    pub fn operations(&self) -> Vec<MailOperation> {
        let mut ops = lock(&self.ops);
        ops.retain(WeakMailOperation::is_alive);
        let live: Vec<MailOperation> = ops.iter().filter_map(WeakMailOperation::upgrade).collect();
        live
    }

    pub fn get_by_source(&self, source: &OperationSource) -> Vec<MailOperation> {
        self.operations()
            .into_iter()
            .filter(|op| op.is_mine(source))
            .collect()
    }

    /// Whether `source` has operations that have not finished
    pub fn has_operations_for(&self, source: &OperationSource) -> bool {
        self.operations()
            .iter()
            .any(|op| op.is_mine(source) && !op.is_finished())
    }

    /// Cancel every unfinished operation; returns how many were canceled
    pub fn cancel_all(&self) -> usize {
        let count = self.operations().iter().filter(|op| op.cancel()).count();
        info!("Canceled {} queued operations", count);
        count
    }

    pub fn cancel_by_source(&self, source: &OperationSource) -> usize {
        self.get_by_source(source)
            .iter()
            .filter(|op| op.cancel())
            .count()
    }

    pub fn connect_queue_changed<F>(&self, f: F)
    where
        F: Fn(QueueEvent, &MailOperation) + Send + Sync + 'static,
    {
        lock(&self.handlers).push(Arc::new(f));
    }

    fn notify(&self, event: QueueEvent, op: &MailOperation) {
        let handlers: Vec<QueueHandler> = lock(&self.handlers).clone();
        for handler in handlers {
            handler(event, op);
        }
    }
}
