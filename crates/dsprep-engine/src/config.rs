use dsprep_core::Env;
use serde::Deserialize;

fn default_worker_count() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerDefaults {
    #[serde(default = "default_worker_count")]
    pub cpu_workers: usize,
    #[serde(default = "default_worker_count")]
    pub gpu_workers: usize,
    #[serde(default = "default_worker_count")]
    pub io_workers: usize,
}

impl Default for WorkerDefaults {
    fn default() -> Self {
        Self {
            cpu_workers: default_worker_count(),
            gpu_workers: default_worker_count(),
            io_workers: default_worker_count(),
        }
    }
}

/// One entry in an ordered `[[tasks]]` / `[[input]]` / `[[output]]` list.
/// Modeled as a list rather than a generic `id -> config` map so that
/// "config order is pipeline order" (tasks especially) is structural
/// rather than a convention a map could silently violate.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfigEntry {
    pub id: String,
    #[serde(flatten)]
    pub settings: toml::Table,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub workers: WorkerDefaults,

    #[serde(default)]
    pub input: Vec<ComponentConfigEntry>,

    #[serde(default)]
    pub output: Vec<ComponentConfigEntry>,

    #[serde(default)]
    pub tasks: Vec<ComponentConfigEntry>,

    #[serde(default)]
    pub env: Env,

    #[serde(default)]
    pub suppress_invalid_keys: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workers: WorkerDefaults::default(),
            input: Vec::new(),
            output: Vec::new(),
            tasks: Vec::new(),
            env: Env::new(),
            suppress_invalid_keys: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("reading config file {}: {err}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}
