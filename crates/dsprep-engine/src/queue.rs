use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dsprep_core::WorkItem;
use tokio::sync::{mpsc, Mutex};

use crate::shutdown::ShutdownWatch;

/// A bounded FIFO with an explicit length counter, since
/// `tokio::sync::mpsc` doesn't expose one. The receiver lives behind a
/// `tokio::sync::Mutex` because several workers (this stage's own, plus
/// any stage stealing from it) contend to dequeue from the same channel.
pub(crate) struct Queue {
    tx: mpsc::Sender<WorkItem>,
    rx: Mutex<mpsc::Receiver<WorkItem>>,
    len: AtomicUsize,
}

impl Queue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            len: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len.load(Ordering::SeqCst) == 0
    }

    /// Blocks the caller when the queue is full (the pipeline's sole
    /// backpressure mechanism). Cancel-safe: if `shutdown` fires first,
    /// the send is abandoned and `item` is dropped ("queued items
    /// discarded" on shutdown).
    pub(crate) async fn submit(&self, item: WorkItem, shutdown: &mut ShutdownWatch) {
        tokio::select! {
            res = self.tx.send(item) => {
                if res.is_ok() {
                    self.len.fetch_add(1, Ordering::SeqCst);
                }
            }
            _ = shutdown.wait_for_shutdown() => {}
        }
    }

    /// Poll with a bounded timeout, purely so the caller can periodically
    /// revisit the shutdown flag and fall back to stealing.
    pub(crate) async fn recv_timeout(&self, timeout: Duration) -> Option<WorkItem> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(item)) => {
                self.len.fetch_sub(1, Ordering::SeqCst);
                Some(item)
            }
            _ => None,
        }
    }

    /// Non-blocking dequeue for work-stealing. Never blocks or spins: a
    /// receiver already held by the owning stage's worker just looks like
    /// "nothing available" to a stealer.
    pub(crate) fn try_steal(&self) -> Option<WorkItem> {
        let mut rx = self.rx.try_lock().ok()?;
        match rx.try_recv() {
            Ok(item) => {
                self.len.fetch_sub(1, Ordering::SeqCst);
                Some(item)
            }
            Err(_) => None,
        }
    }
}
