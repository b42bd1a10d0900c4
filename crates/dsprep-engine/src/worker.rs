use std::sync::Arc;
use std::time::Duration;

use dsprep_core::WorkItem;
use tracing::{debug, warn};

use crate::scheduler::Scheduler;
use crate::shutdown::ShutdownWatch;

/// How long a worker blocks on its own queue before checking shutdown and
/// falling back to stealing from a sibling stage.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// One worker slot's lifetime: acquire an item (own queue, then steal),
/// run it through the *owning* stage's task with retries, forward or drop
/// it, repeat until shutdown with nothing left to do.
///
/// A stolen item keeps the stage it was stolen from for the rest of this
/// iteration — its task, its rate limit, its retry budget, its counters,
/// and its successor — the thief only lends a worker slot. Only this
/// worker's own idle flag (`worker_index` in `stage_index`'s pool) is
/// touched; the item's owning stage's idle/queue state is whatever it
/// already was.
pub(crate) async fn run(scheduler: Arc<Scheduler>, stage_index: usize, worker_index: usize) {
    let mut shutdown: ShutdownWatch = scheduler.watch();

    loop {
        let own_stage = scheduler.stage(stage_index);
        own_stage.set_worker_idle(worker_index, true);

        let acquired = match own_stage.poll_own_queue(POLL_TIMEOUT).await {
            Some(item) => Some((stage_index, item)),
            None => scheduler.steal(stage_index),
        };

        let Some((source_index, mut item)) = acquired else {
            if shutdown.is_set() {
                return;
            }
            continue;
        };

        if source_index != stage_index {
            debug!(from = source_index, to = stage_index, "stole work item");
        }

        own_stage.set_worker_idle(worker_index, false);
        let stage = scheduler.stage(source_index);

        if stage.is_rate_limited() {
            stage.submit(item, &mut shutdown).await;
            continue;
        }

        stage.record_work_start();

        let max_attempts = stage.task.max_attempts().max(1);
        let mut outcome = None;
        let mut lost = false;

        for attempt in 1..=max_attempts {
            let task = Arc::clone(&stage.task);
            let blocking = tokio::task::spawn_blocking(move || {
                let result = task.process(&mut item);
                (item, result)
            });

            match blocking.await {
                Ok((returned_item, Ok(accepted))) => {
                    item = returned_item;
                    stage.increment_processed();
                    outcome = Some(accepted);
                    break;
                }
                Ok((returned_item, Err(fault))) => {
                    item = returned_item;
                    warn!(
                        stage = stage.task_id(),
                        attempt, max_attempts, error = %fault, "task fault"
                    );
                }
                Err(join_error) => {
                    warn!(stage = stage.task_id(), error = %join_error, "worker panicked, item lost");
                    lost = true;
                    break;
                }
            }
        }

        if lost {
            continue;
        }

        match outcome {
            Some(true) => forward(&scheduler, source_index, item, &mut shutdown).await,
            // An explicit reject and a retry budget exhausted by nothing but
            // faults are both "this item does not advance" — both count as
            // rejected.
            Some(false) | None => stage.increment_rejected(),
        }
    }
}

async fn forward(
    scheduler: &Arc<Scheduler>,
    stage_index: usize,
    item: WorkItem,
    shutdown: &mut ShutdownWatch,
) {
    if scheduler.is_shutdown() {
        return;
    }
    if let Some(next) = scheduler.next_stage(stage_index) {
        next.submit(item, shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientTaskError;
    use crate::stage::Stage;
    use crate::task::Task;
    use dsprep_core::TaskKind;
    use std::sync::Mutex;

    struct RecordingTask {
        id: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl RecordingTask {
        fn new(id: &'static str, seen: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                id,
                seen: Arc::clone(seen),
            }
        }
    }

    impl Task for RecordingTask {
        fn id(&self) -> &str {
            self.id
        }

        fn kind(&self) -> TaskKind {
            TaskKind::Cpu
        }

        fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
            self.seen.lock().unwrap().push(self.id);
            Ok(true)
        }
    }

    /// Regression test: a worker whose own queue is empty steals an item
    /// from another stage. That item must run under the *stolen-from*
    /// stage's task and forward to the *stolen-from* stage's successor —
    /// never the thief's.
    #[tokio::test(start_paused = true)]
    async fn stolen_item_runs_under_its_own_stage_and_forwards_to_its_own_successor() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stage_a = Stage::new(Arc::new(RecordingTask::new("a", &seen)), 1);
        let stage_a_sink = Stage::new(Arc::new(RecordingTask::new("a-sink", &seen)), 1);
        let stage_b = Stage::new(Arc::new(RecordingTask::new("b", &seen)), 1);
        let scheduler = Scheduler::new(vec![stage_a, stage_a_sink, stage_b]);

        // Place the item directly on stage 0's ("a") queue, never stage 2's.
        let mut feeder = scheduler.watch();
        scheduler
            .stage(0)
            .submit(WorkItem::from_bytes(vec![1]), &mut feeder)
            .await;

        // Worker belongs to stage 2 ("b"); its own queue is empty, forcing a steal.
        let handle = tokio::spawn(run(Arc::clone(&scheduler), 2, 0));

        for _ in 0..10 {
            tokio::time::advance(POLL_TIMEOUT + Duration::from_millis(1)).await;
            tokio::task::yield_now().await;
            if seen.lock().unwrap().len() == 2 {
                break;
            }
        }

        assert_eq!(*seen.lock().unwrap(), vec!["a", "a-sink"]);

        scheduler.shutdown();
        tokio::time::advance(POLL_TIMEOUT + Duration::from_millis(1)).await;
        handle.await.unwrap();
    }
}
