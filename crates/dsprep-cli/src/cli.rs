use std::path::PathBuf;

use clap::Parser;

fn default_config_path() -> PathBuf {
    PathBuf::from("pipeline.toml")
}

#[derive(Debug, Clone, Parser)]
#[command(name = "dsprep", version, about = "Staged dataset-preprocessing pipeline runner")]
pub struct Cli {
    /// Path to the pipeline's TOML configuration file.
    #[arg(short = 'c', long, env = "DSPREP_CONFIG", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Overrides the config file's `log_level`.
    #[arg(long, env = "DSPREP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Overrides `workers.cpu_workers` for every CPU-bound task.
    #[arg(long, env = "DSPREP_CPU_WORKERS")]
    pub cpu_workers: Option<usize>,

    /// Overrides `workers.gpu_workers` for every GPU-bound task.
    #[arg(long, env = "DSPREP_GPU_WORKERS")]
    pub gpu_workers: Option<usize>,

    /// Overrides `workers.io_workers` for every IO-bound task and sink.
    #[arg(long, env = "DSPREP_IO_WORKERS")]
    pub io_workers: Option<usize>,
}
