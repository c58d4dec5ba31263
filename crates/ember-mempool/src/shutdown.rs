//! Shutdown signalling and background-task supervision

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// One-shot shutdown broadcast.
///
/// Listeners hold a cloned receiver; once [`ShutdownSignal::signal`] drops
/// the inner sender, every pending and future `recv` on that receiver
/// returns `Err`, which makes it usable as a `select!` done-arm.
pub struct ShutdownSignal {
    closed: AtomicBool,
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// Create a new, un-signalled shutdown handle
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            closed: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Receiver to select on; readable (as disconnect) once signalled
    pub fn subscribe(&self) -> Receiver<()> {
        self.rx.clone()
    }

    /// Fire the shutdown. Returns true for the caller that actually
    /// performed it; every later call is a no-op returning false.
    pub fn signal(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.tx.lock().take();
        true
    }

    /// Whether shutdown has been signalled
    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of background threads joined on close
pub struct TaskSupervisor {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskSupervisor {
    /// Create an empty supervisor
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a named thread and register it for joining
    pub fn spawn<F>(&self, name: &str, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .expect("failed to spawn background thread");
        self.handles.lock().push(handle);
    }

    /// Block until every registered thread has exited. The registry lock
    /// is held across the joins, so concurrent callers also block until
    /// teardown completes.
    pub fn join_all(&self) {
        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            if let Err(err) = handle.join() {
                tracing::error!("background thread panicked: {:?}", err);
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot completion signal, waited on by [`crate::Mempool::wait_ready`]
pub struct ReadySignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl ReadySignal {
    /// Create an unfired signal
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Fire the signal; idempotent
    pub fn notify(&self) {
        let mut ready = self.ready.lock();
        *ready = true;
        self.cond.notify_all();
    }

    /// Block until the signal has fired
    pub fn wait(&self) {
        let mut ready = self.ready.lock();
        while !*ready {
            self.cond.wait(&mut ready);
        }
    }

    /// Whether the signal has fired
    pub fn is_ready(&self) -> bool {
        *self.ready.lock()
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_signal_fires_once() {
        let sig = ShutdownSignal::new();
        assert!(!sig.is_shutdown());
        assert!(sig.signal());
        assert!(!sig.signal());
        assert!(sig.is_shutdown());
    }

    #[test]
    fn test_subscribers_observe_shutdown() {
        let sig = Arc::new(ShutdownSignal::new());
        let rx = sig.subscribe();
        let waiter = {
            let rx = rx.clone();
            std::thread::spawn(move || rx.recv().is_err())
        };
        std::thread::sleep(Duration::from_millis(20));
        sig.signal();
        assert!(waiter.join().unwrap());
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_supervisor_joins_all() {
        let sup = TaskSupervisor::new();
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for i in 0..4 {
            let counter = Arc::clone(&counter);
            sup.spawn(&format!("worker-{}", i), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        sup.join_all();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_ready_signal_unblocks_waiters() {
        let sig = Arc::new(ReadySignal::new());
        assert!(!sig.is_ready());
        let waiter = {
            let sig = Arc::clone(&sig);
            std::thread::spawn(move || sig.wait())
        };
        std::thread::sleep(Duration::from_millis(20));
        sig.notify();
        waiter.join().unwrap();
        assert!(sig.is_ready());
        // waiting after the fact returns immediately
        sig.wait();
    }
}
