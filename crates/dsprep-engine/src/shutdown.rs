use tokio::sync::watch;

/// The pipeline-wide shutdown flag. A `watch` channel rather than a plain
/// `AtomicBool` + `Notify` so that a worker blocked on a full downstream
/// queue can race the blocking send against the shutdown signal without a
/// missed-wakeup window: `watch::Receiver::wait_for` checks the current
/// value before it starts waiting, an `AtomicBool` paired with `Notify`
/// does not.
#[derive(Clone)]
pub(crate) struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownWatch(watch::Receiver<bool>);

impl ShutdownSignal {
    pub(crate) fn new() -> (Self, ShutdownWatch) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownWatch(rx))
    }

    pub(crate) fn set(&self) {
        let _ = self.tx.send(true);
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ShutdownWatch {
    pub fn is_set(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been signalled. Checks the current value
    /// first, so it never misses a signal sent before this call started.
    pub(crate) async fn wait_for_shutdown(&mut self) {
        let _ = self.0.wait_for(|set| *set).await;
    }
}
