use std::sync::Arc;

use dsprep_core::WorkItem;

use crate::shutdown::{ShutdownSignal, ShutdownWatch};
use crate::stage::Stage;

/// The pipeline coordinator: the ordered list of stages, the global
/// work-stealing endpoint, and pipeline-wide shutdown.
pub struct Scheduler {
    stages: Vec<Arc<Stage>>,
    shutdown: ShutdownSignal,
    shutdown_watch: ShutdownWatch,
}

impl Scheduler {
    pub(crate) fn new(stages: Vec<Arc<Stage>>) -> Arc<Self> {
        let (shutdown, shutdown_watch) = ShutdownSignal::new();
        Arc::new(Self {
            stages,
            shutdown,
            shutdown_watch,
        })
    }

    pub fn stages(&self) -> &[Arc<Stage>] {
        &self.stages
    }

    pub(crate) fn stage(&self, index: usize) -> &Arc<Stage> {
        &self.stages[index]
    }

    /// O(1) successor in pipeline order; `None` for the last stage.
    pub fn next_stage(&self, index: usize) -> Option<&Arc<Stage>> {
        self.stages.get(index + 1)
    }

    /// Iterate all stages other than the requester, in pipeline order;
    /// return the first successful non-blocking dequeue.
    pub(crate) fn steal(&self, requester_index: usize) -> Option<(usize, WorkItem)> {
        for (index, stage) in self.stages.iter().enumerate() {
            if index == requester_index {
                continue;
            }
            if let Some(item) = stage.steal_work() {
                return Some((index, item));
            }
        }
        None
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_set()
    }

    /// Sets the shutdown flag. Workers observe it on their next loop
    /// iteration and exit after finishing any in-flight `process` call;
    /// idempotent.
    pub fn shutdown(&self) {
        self.shutdown.set();
    }

    pub fn watch(&self) -> ShutdownWatch {
        self.shutdown_watch.clone()
    }

    /// The pipeline is drained: every stage idle and every queue empty,
    /// observed simultaneously.
    pub fn is_idle(&self) -> bool {
        self.stages.iter().all(|stage| stage.is_idle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientTaskError;
    use crate::task::Task;
    use dsprep_core::TaskKind;

    struct PassthroughTask(&'static str);

    impl Task for PassthroughTask {
        fn id(&self) -> &str {
            self.0
        }

        fn kind(&self) -> TaskKind {
            TaskKind::Cpu
        }

        fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
            Ok(true)
        }
    }

    fn two_stage_scheduler() -> Arc<Scheduler> {
        let a = Stage::new(Arc::new(PassthroughTask("a")), 1);
        let b = Stage::new(Arc::new(PassthroughTask("b")), 1);
        Scheduler::new(vec![a, b])
    }

    #[test]
    fn next_stage_is_successor_and_none_past_the_end() {
        let scheduler = two_stage_scheduler();
        assert_eq!(scheduler.next_stage(0).unwrap().task_id(), "b");
        assert!(scheduler.next_stage(1).is_none());
    }

    #[tokio::test]
    async fn steal_skips_the_requesting_stage() {
        let scheduler = two_stage_scheduler();
        let (_signal, mut shutdown) = crate::shutdown::ShutdownSignal::new();
        scheduler.stage(1).submit(WorkItem::from_bytes(vec![1]), &mut shutdown).await;

        // stage 1 has an item; stage 1 stealing from itself must find nothing.
        assert!(scheduler.steal(1).is_none());
        // stage 0 stealing picks it up from stage 1.
        let stolen = scheduler.steal(0);
        assert_eq!(stolen.map(|(from, _)| from), Some(1));
    }

    #[test]
    fn shutdown_is_idempotent_and_observable() {
        let scheduler = two_stage_scheduler();
        assert!(!scheduler.is_shutdown());
        scheduler.shutdown();
        scheduler.shutdown();
        assert!(scheduler.is_shutdown());
        assert!(scheduler.watch().is_set());
    }
}
