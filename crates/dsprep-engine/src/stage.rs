use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dsprep_core::WorkItem;

use crate::queue::Queue;
use crate::shutdown::ShutdownWatch;
use crate::task::Task;

const MIN_QUEUE_CAPACITY: usize = 16;
const MAX_QUEUE_CAPACITY: usize = 1024;
const QUEUE_CAPACITY_PER_WORKER: usize = 10;

fn queue_capacity(pool_size: usize) -> usize {
    (pool_size * QUEUE_CAPACITY_PER_WORKER).clamp(MIN_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY)
}

/// One task plus its worker pool and bounded queue.
pub struct Stage {
    pub(crate) task: Arc<dyn Task>,
    queue: Queue,
    pool_size: usize,
    idle: Vec<AtomicBool>,
    processed: AtomicU64,
    rejected: AtomicU64,
    first_work_at: OnceLock<Instant>,
}

impl Stage {
    pub(crate) fn new(task: Arc<dyn Task>, pool_size: usize) -> Arc<Self> {
        let pool_size = pool_size.max(1);
        Arc::new(Self {
            task,
            queue: Queue::new(queue_capacity(pool_size)),
            pool_size,
            idle: (0..pool_size).map(|_| AtomicBool::new(true)).collect(),
            processed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            first_work_at: OnceLock::new(),
        })
    }

    pub fn task_id(&self) -> &str {
        self.task.id()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// `is_idle ⇔` every worker is idle *and* the queue is empty.
    pub fn is_idle(&self) -> bool {
        self.idle.iter().all(|flag| flag.load(Ordering::SeqCst)) && self.queue.is_empty()
    }

    pub(crate) fn set_worker_idle(&self, worker_idx: usize, idle: bool) {
        self.idle[worker_idx].store(idle, Ordering::SeqCst);
    }

    pub async fn submit(&self, item: WorkItem, shutdown: &mut ShutdownWatch) {
        self.queue.submit(item, shutdown).await;
    }

    pub(crate) async fn poll_own_queue(&self, timeout: Duration) -> Option<WorkItem> {
        self.queue.recv_timeout(timeout).await
    }

    /// Non-blocking dequeue for the scheduler's stealing endpoint.
    pub(crate) fn steal_work(&self) -> Option<WorkItem> {
        self.queue.try_steal()
    }

    pub(crate) fn record_work_start(&self) {
        let _ = self.first_work_at.set(Instant::now());
    }

    pub(crate) fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// `elapsed ≤ 0` or `processed = 0` ⇒ never throttle; no configured
    /// `max_ipm` ⇒ never throttle.
    pub(crate) fn is_rate_limited(&self) -> bool {
        let Some(max_ipm) = self.task.max_ipm() else {
            return false;
        };
        let Some(first_at) = self.first_work_at.get() else {
            return false;
        };
        let elapsed = first_at.elapsed().as_secs_f64();
        let processed = self.processed();
        if elapsed <= 0.0 || processed == 0 {
            return false;
        }
        let ipm = (processed as f64 / elapsed) * 60.0;
        ipm > max_ipm as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientTaskError;
    use dsprep_core::TaskKind;

    struct NoopTask {
        max_ipm: Option<u32>,
    }

    impl Task for NoopTask {
        fn id(&self) -> &str {
            "noop"
        }

        fn kind(&self) -> TaskKind {
            TaskKind::Cpu
        }

        fn max_ipm(&self) -> Option<u32> {
            self.max_ipm
        }

        fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
            Ok(true)
        }
    }

    fn stage(max_ipm: Option<u32>, pool_size: usize) -> Arc<Stage> {
        Stage::new(Arc::new(NoopTask { max_ipm }), pool_size)
    }

    #[test]
    fn queue_capacity_is_clamped() {
        assert_eq!(queue_capacity(0), MIN_QUEUE_CAPACITY);
        assert_eq!(queue_capacity(1), MIN_QUEUE_CAPACITY);
        assert_eq!(queue_capacity(4), 40);
        assert_eq!(queue_capacity(1000), MAX_QUEUE_CAPACITY);
    }

    #[test]
    fn unlimited_task_is_never_rate_limited() {
        let stage = stage(None, 1);
        stage.record_work_start();
        for _ in 0..1000 {
            stage.increment_processed();
        }
        assert!(!stage.is_rate_limited());
    }

    #[test]
    fn rate_limit_is_inactive_before_first_work() {
        let stage = stage(Some(1), 1);
        assert!(!stage.is_rate_limited());
    }

    #[test]
    fn idle_requires_every_worker_flag_and_empty_queue() {
        let stage = stage(None, 2);
        assert!(stage.is_idle());
        stage.set_worker_idle(0, false);
        assert!(!stage.is_idle());
        stage.set_worker_idle(0, true);
        assert!(stage.is_idle());
    }

    #[tokio::test]
    async fn submit_then_poll_returns_same_item() {
        let stage = stage(None, 1);
        let (_signal, mut shutdown) = crate::shutdown::ShutdownSignal::new();
        stage.submit(WorkItem::from_bytes(vec![9]), &mut shutdown).await;
        let item = stage
            .poll_own_queue(std::time::Duration::from_millis(100))
            .await;
        assert!(item.is_some());
    }
}
