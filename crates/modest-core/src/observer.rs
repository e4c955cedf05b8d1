//! Collects the headers a folder refresh reports as new

use modest_store::{FolderObserver, MessageHeader};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Transient observer attached to one folder during one refresh.
///
/// Headers at or above `max_size` bytes are dropped silently.
pub struct NewHeadersObserver {
    max_size: u64,
    headers: Mutex<Vec<MessageHeader>>,
}

impl NewHeadersObserver {
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            headers: Mutex::new(Vec::new()),
        }
    }

    /// Observer that keeps every header
    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    pub fn into_headers(self) -> Vec<MessageHeader> {
        self.headers
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl FolderObserver for NewHeadersObserver {
    fn headers_added(&self, headers: &[MessageHeader]) {
        let mut kept = self.headers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = kept.len();
        kept.extend(
            headers
                .iter()
                .filter(|h| h.size < self.max_size)
                .cloned(),
        );
        let skipped = headers.len() - (kept.len() - before);
        if skipped > 0 {
            debug!("Skipping {} headers over {} bytes", skipped, self.max_size);
        }
    }
}
