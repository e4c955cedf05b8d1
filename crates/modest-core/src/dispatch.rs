//! Hand-off of work from operation threads to the UI thread.
//!
//! Worker threads never touch UI-visible state directly. They push closures
//! through an [`IdleSender`]; the thread owning the [`IdleLoop`] runs them in
//! the order they were queued.

use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::warn;

type IdleFn = Box<dyn FnOnce() + Send>;

/// Queues closures for the UI thread. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct IdleSender {
    tx: mpsc::Sender<IdleFn>,
}

impl IdleSender {
    /// Run `f` on the UI thread at the next dispatch
    pub fn idle_add<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(f)).is_err() {
            warn!("UI loop is gone, dropping idle callback");
        }
    }
}

/// Receiving end, owned by the UI thread
pub struct IdleLoop {
    rx: mpsc::Receiver<IdleFn>,
}

impl IdleLoop {
    pub fn new() -> (IdleSender, IdleLoop) {
        let (tx, rx) = mpsc::channel();
        (IdleSender { tx }, IdleLoop { rx })
    }

    /// Run every closure queued so far without blocking; returns how many ran
    pub fn dispatch_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(f) = self.rx.try_recv() {
            f();
            count += 1;
        }
        count
    }

    /// Wait up to `timeout` for one closure and run it
    pub fn iterate(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(f) => {
                f();
                true
            }
            Err(_) => false,
        }
    }

    /// Dispatch until `done` holds or `timeout` elapses; returns whether `done` held
    pub fn run_until(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.dispatch_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.iterate((deadline - now).min(Duration::from_millis(20)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closures_run_in_order_on_dispatching_thread() {
        let (sender, idle) = IdleLoop::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ui_thread = std::thread::current().id();

        let worker = {
            let seen = seen.clone();
            std::thread::spawn(move || {
                for i in 0..3 {
                    let seen = seen.clone();
                    sender.idle_add(move || {
                        assert_eq!(std::thread::current().id(), ui_thread);
                        seen.lock().unwrap().push(i);
                    });
                }
            })
        };
        worker.join().unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(idle.dispatch_pending(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_run_until_times_out() {
        let (_sender, idle) = IdleLoop::new();
        assert!(!idle.run_until(|| false, Duration::from_millis(30)));
        assert!(idle.run_until(|| true, Duration::from_millis(30)));
    }
}
