use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::info;

use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;
use crate::worker;

/// How often the driver re-checks the pipeline for quiescence while
/// sources have finished and stages drain.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct StageSummary {
    pub task_id: String,
    pub processed: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub items_submitted: u64,
    pub stages: Vec<StageSummary>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total_processed(&self) -> u64 {
        self.stages.iter().map(|s| s.processed).sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.stages.iter().map(|s| s.rejected).sum()
    }

    /// A human-readable per-stage report, the Rust analogue of the
    /// original preprocessor's end-of-run task report.
    pub fn to_report_string(&self) -> String {
        let mut report = format!(
            "Run report: {} items submitted in {:.2}s\n",
            self.items_submitted,
            self.elapsed.as_secs_f64()
        );
        for stage in &self.stages {
            report.push_str(&format!(
                "  {}: processed={} rejected={}\n",
                stage.task_id, stage.processed, stage.rejected
            ));
        }
        report
    }
}

/// Runs a [`Pipeline`] to completion: spawns every stage's worker pool,
/// drains every source into the first stage, waits for the whole pipeline
/// to go idle, then signals shutdown and joins every worker.
pub struct Driver;

impl Driver {
    pub async fn run(pipeline: Pipeline) -> anyhow::Result<RunSummary> {
        let Pipeline { sources, .. } = &pipeline;
        let scheduler = pipeline.scheduler();
        let started = Instant::now();

        let mut workers = JoinSet::new();
        for (stage_index, stage) in scheduler.stages().iter().enumerate() {
            for worker_index in 0..stage.pool_size() {
                let scheduler = Arc::clone(&scheduler);
                workers.spawn(worker::run(scheduler, stage_index, worker_index));
            }
        }
        info!(workers = workers.len(), "worker pools started");

        let items_submitted = feed_sources(&scheduler, sources).await;
        wait_until_idle(&scheduler).await;
        scheduler.shutdown();

        while workers.join_next().await.is_some() {}

        let elapsed = started.elapsed();
        let stages = scheduler
            .stages()
            .iter()
            .map(|stage| StageSummary {
                task_id: stage.task_id().to_string(),
                processed: stage.processed(),
                rejected: stage.rejected(),
            })
            .collect();

        Ok(RunSummary {
            items_submitted,
            stages,
            elapsed,
        })
    }
}

async fn feed_sources(scheduler: &Arc<Scheduler>, sources: &[Box<dyn crate::source::Source>]) -> u64 {
    let Some(first_stage) = scheduler.stages().first() else {
        return 0;
    };
    let mut shutdown = scheduler.watch();
    let mut submitted = 0u64;
    for source in sources {
        for item in source.next() {
            if shutdown.is_set() {
                return submitted;
            }
            first_stage.submit(item, &mut shutdown).await;
            submitted += 1;
        }
    }
    submitted
}

async fn wait_until_idle(scheduler: &Arc<Scheduler>) {
    while !scheduler.is_idle() {
        tokio::time::sleep(IDLE_POLL_INTERVAL).await;
    }
}
