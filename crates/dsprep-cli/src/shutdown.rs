use std::sync::Arc;

use dsprep_engine::Scheduler;
use tracing::warn;

/// First Ctrl+C asks the scheduler to drain gracefully; a second forces an
/// immediate process exit for an operator who doesn't want to wait.
pub fn spawn_ctrl_c_handler(scheduler: Arc<Scheduler>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("shutdown requested, draining in-flight work");
        scheduler.shutdown();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("second shutdown request, exiting immediately");
        std::process::exit(130);
    });
}
