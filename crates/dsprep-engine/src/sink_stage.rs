use dsprep_core::{TaskKind, WorkItem};
use tracing::warn;

use crate::error::TransientTaskError;
use crate::sink::Sink;
use crate::task::Task;

/// Adapts every configured [`Sink`] into a single synthesized terminal
/// [`Task`]: `process` calls `save` on each sink in turn against the same
/// still-open item, logs and folds per-sink faults into a rejected result
/// rather than aborting the remaining sinks, then closes the item and
/// returns the logical AND of every sink's success.
pub(crate) struct SinkStage {
    sinks: Vec<Box<dyn Sink>>,
    pool_size: Option<usize>,
    max_attempts: u32,
}

impl SinkStage {
    pub(crate) fn new(
        sinks: Vec<Box<dyn Sink>>,
        pool_size: Option<usize>,
        max_attempts: u32,
    ) -> Self {
        Self {
            sinks,
            pool_size,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Task for SinkStage {
    fn id(&self) -> &str {
        "sink"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Io
    }

    fn desired_pool_size(&self) -> Option<usize> {
        self.pool_size
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn process(&self, item: &mut WorkItem) -> Result<bool, TransientTaskError> {
        let mut all_saved = true;
        for sink in &self.sinks {
            match sink.save(item) {
                Ok(true) => {}
                Ok(false) => all_saved = false,
                Err(err) => {
                    warn!(sink = sink.id(), error = %err, "sink save failed");
                    all_saved = false;
                }
            }
        }
        item.close();
        Ok(all_saved)
    }
}
