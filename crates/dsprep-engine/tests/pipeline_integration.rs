use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dsprep_engine::{
    build_pipeline, Driver, PipelineConfig, Registry, Scheduler, Sink, Source, Task, TaskKind,
    TransientTaskError, WorkItem,
};

struct CountingSource {
    remaining: AtomicUsize,
}

impl Source for CountingSource {
    fn id(&self) -> &str {
        "counting"
    }

    fn next(&self) -> Box<dyn Iterator<Item = WorkItem> + '_> {
        let n = self.remaining.swap(0, Ordering::SeqCst);
        Box::new((0..n).map(|i| WorkItem::from_bytes(vec![i as u8])))
    }
}

/// Raises a fault on its first two invocations (shared across every item
/// processed by this stage), then accepts.
struct FlakyTask {
    attempts: AtomicUsize,
}

impl Task for FlakyTask {
    fn id(&self) -> &str {
        "flaky"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Cpu
    }

    fn max_attempts(&self) -> u32 {
        5
    }

    fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Err(anyhow::anyhow!("transient failure").into())
        } else {
            Ok(true)
        }
    }
}

struct CollectingSink {
    saved: Arc<AtomicUsize>,
}

impl Sink for CollectingSink {
    fn id(&self) -> &str {
        "collecting"
    }

    fn save(&self, _item: &mut WorkItem) -> anyhow::Result<bool> {
        self.saved.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[tokio::test]
async fn retried_item_is_eventually_forwarded_and_saved() {
    let saved = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();
    registry.register_source("counting", || {
        Box::new(CountingSource {
            remaining: AtomicUsize::new(3),
        })
    });
    registry.register_task("flaky", || {
        Box::new(FlakyTask {
            attempts: AtomicUsize::new(0),
        })
    });
    {
        let saved = Arc::clone(&saved);
        registry.register_sink("collecting", move || {
            Box::new(CollectingSink {
                saved: Arc::clone(&saved),
            })
        });
    }

    let toml = r#"
        [workers]
        cpu_workers = 1
        io_workers = 1

        [[input]]
        id = "counting"

        [[tasks]]
        id = "flaky"

        [[output]]
        id = "collecting"
    "#;
    let config = PipelineConfig::from_toml_str(toml).unwrap();
    let pipeline = build_pipeline(&config, &registry).unwrap();
    let summary = Driver::run(pipeline).await.unwrap();

    assert_eq!(saved.load(Ordering::SeqCst), 3);
    // flaky: 2 faults (uncounted) + 3 accepts; sink: 3 accepts.
    assert_eq!(summary.total_processed(), 6);
    assert_eq!(summary.total_rejected(), 0);
}

/// Always rejects; the stage's retry loop must not retry past a single
/// explicit reject.
struct AlwaysRejectTask {
    calls: Arc<AtomicUsize>,
}

impl Task for AlwaysRejectTask {
    fn id(&self) -> &str {
        "reject"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Cpu
    }

    fn max_attempts(&self) -> u32 {
        5
    }

    fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

#[tokio::test]
async fn explicit_reject_breaks_retry_loop_immediately() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();
    registry.register_source("counting", || {
        Box::new(CountingSource {
            remaining: AtomicUsize::new(4),
        })
    });
    {
        let calls = Arc::clone(&calls);
        registry.register_task("reject", move || {
            Box::new(AlwaysRejectTask {
                calls: Arc::clone(&calls),
            })
        });
    }

    let toml = r#"
        [workers]
        cpu_workers = 1

        [[input]]
        id = "counting"

        [[tasks]]
        id = "reject"
    "#;
    let config = PipelineConfig::from_toml_str(toml).unwrap();
    let pipeline = build_pipeline(&config, &registry).unwrap();
    let summary = Driver::run(pipeline).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(summary.stages[0].processed, 4);
    assert_eq!(summary.stages[0].rejected, 4);
}

#[tokio::test]
async fn build_pipeline_rejects_unknown_component_id() {
    let registry = Registry::new();
    let toml = r#"
        [[tasks]]
        id = "does-not-exist"
    "#;
    let config = PipelineConfig::from_toml_str(toml).unwrap();
    let err = build_pipeline(&config, &registry).unwrap_err();
    assert!(err.to_string().contains("unknown task"));
}

#[tokio::test]
async fn build_pipeline_requires_at_least_one_task() {
    let registry = Registry::new();
    let config = PipelineConfig::from_toml_str("").unwrap();
    let err = build_pipeline(&config, &registry).unwrap_err();
    assert!(err.to_string().contains("no tasks"));
}

/// Always accepts; `max_ipm` is configured low enough to trip the rate
/// limiter after the first item, exercising the resubmit-and-recheck loop.
struct RateLimitedTask {
    max_ipm: u32,
}

impl Task for RateLimitedTask {
    fn id(&self) -> &str {
        "limited"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Cpu
    }

    fn max_ipm(&self) -> Option<u32> {
        Some(self.max_ipm)
    }

    fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
        Ok(true)
    }
}

#[tokio::test]
async fn rate_limited_task_eventually_forwards_every_item() {
    let mut registry = Registry::new();
    registry.register_source("counting", || {
        Box::new(CountingSource {
            remaining: AtomicUsize::new(3),
        })
    });
    registry.register_task("limited", || Box::new(RateLimitedTask { max_ipm: 3_000 }));

    let toml = r#"
        [workers]
        cpu_workers = 1

        [[input]]
        id = "counting"

        [[tasks]]
        id = "limited"
    "#;
    let config = PipelineConfig::from_toml_str(toml).unwrap();
    let pipeline = build_pipeline(&config, &registry).unwrap();

    let summary = tokio::time::timeout(std::time::Duration::from_secs(5), Driver::run(pipeline))
        .await
        .expect("a rate-limited run must still finish well within the timeout")
        .unwrap();

    assert_eq!(summary.stages[0].processed, 3);
    assert_eq!(summary.stages[0].rejected, 0);
}

/// Accepts after a real (blocking) delay, so a backlog builds up in the
/// stage's bounded queue while the test triggers shutdown mid-run.
struct SlowTask;

impl Task for SlowTask {
    fn id(&self) -> &str {
        "slow"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Cpu
    }

    fn process(&self, _item: &mut WorkItem) -> Result<bool, TransientTaskError> {
        std::thread::sleep(std::time::Duration::from_millis(15));
        Ok(true)
    }
}

#[tokio::test]
async fn shutdown_mid_run_discards_the_remaining_backlog() {
    let mut registry = Registry::new();
    registry.register_source("counting", || {
        Box::new(CountingSource {
            remaining: AtomicUsize::new(20),
        })
    });
    registry.register_task("slow", || Box::new(SlowTask));

    let toml = r#"
        [workers]
        cpu_workers = 1

        [[input]]
        id = "counting"

        [[tasks]]
        id = "slow"
    "#;
    let config = PipelineConfig::from_toml_str(toml).unwrap();
    let pipeline = build_pipeline(&config, &registry).unwrap();
    let scheduler: Arc<Scheduler> = pipeline.scheduler();

    let handle = tokio::spawn(Driver::run(pipeline));
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    scheduler.shutdown();

    let summary = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("shutdown must make the driver return promptly")
        .unwrap()
        .unwrap();

    let handled = summary.stages[0].processed + summary.stages[0].rejected;
    assert!(
        handled < 20,
        "shutdown should discard the unfinished backlog, but all {handled} items were handled"
    );
}
