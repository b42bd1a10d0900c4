mod cli;
mod demo;
mod shutdown;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dsprep_engine::{build_pipeline, Driver, PipelineConfig, Registry};

use crate::cli::Cli;
use crate::shutdown::spawn_ctrl_c_handler;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_overrides(config: &mut PipelineConfig, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(n) = cli.cpu_workers {
        config.workers.cpu_workers = n;
    }
    if let Some(n) = cli.gpu_workers {
        config.workers.gpu_workers = n;
    }
    if let Some(n) = cli.io_workers {
        config.workers.io_workers = n;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(&cli.config)
        .map_err(|err| anyhow::anyhow!("loading {}: {err:#}", cli.config.display()))?;
    apply_overrides(&mut config, &cli);

    init_tracing(&config.log_level);

    let mut registry = Registry::new();
    demo::register_demo_components(&mut registry);

    let pipeline = build_pipeline(&config, &registry)?;
    let scheduler = pipeline.scheduler();
    spawn_ctrl_c_handler(scheduler);

    let summary = Driver::run(pipeline).await?;

    tracing::info!(
        elapsed_ms = summary.elapsed.as_millis() as u64,
        items_submitted = summary.items_submitted,
        total_processed = summary.total_processed(),
        total_rejected = summary.total_rejected(),
        "pipeline run complete"
    );
    print!("{}", summary.to_report_string());

    Ok(())
}
