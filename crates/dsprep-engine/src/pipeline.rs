use std::collections::HashSet;
use std::sync::Arc;

use dsprep_core::{Env, TaskKind};
use tracing::warn;

use crate::config::{ComponentConfigEntry, PipelineConfig};
use crate::error::{ComponentKind, ConfigError, InitError, PipelineError};
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::sink::Sink;
use crate::sink_stage::SinkStage;
use crate::source::Source;
use crate::stage::Stage;
use crate::task::Task;

/// A fully assembled, not-yet-running pipeline: an ordered [`Scheduler`]
/// of stages plus the sources that feed the first one.
pub struct Pipeline {
    scheduler: Arc<Scheduler>,
    pub(crate) sources: Vec<Box<dyn Source>>,
}

impl Pipeline {
    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }
}

/// Construct and initialize every configured source, task, and sink, wire
/// them into an ordered chain of [`Stage`]s, and return the runnable
/// [`Pipeline`]. Fails fast: an unknown id, a duplicate id, a rejected
/// configuration (unless `suppress_invalid_keys` is set, in which case that
/// one component is skipped and a warning logged), or a failed
/// `initialize()` aborts the whole build.
pub fn build_pipeline(
    config: &PipelineConfig,
    registry: &Registry,
) -> Result<Pipeline, PipelineError> {
    if config.tasks.is_empty() {
        return Err(ConfigError::NoTasks.into());
    }

    let sources = build_sources(&config.input, registry, &config.env, config.suppress_invalid_keys)?;
    let sinks = build_sinks(&config.output, registry, &config.env, config.suppress_invalid_keys)?;
    let tasks = build_tasks(&config.tasks, registry, &config.env, config.suppress_invalid_keys)?;

    let mut stages = Vec::with_capacity(tasks.len() + sinks.len());
    for task in tasks {
        let pool_size = task.desired_pool_size().unwrap_or_else(|| match task.kind() {
            TaskKind::Cpu => config.workers.cpu_workers,
            TaskKind::Gpu => config.workers.gpu_workers,
            TaskKind::Io => config.workers.io_workers,
        });
        stages.push(Stage::new(Arc::from(task), pool_size));
    }

    if !sinks.is_empty() {
        let pool_size = config.workers.io_workers;
        let wrapped: Box<dyn Task> = Box::new(SinkStage::new(sinks, Some(pool_size), 1));
        stages.push(Stage::new(Arc::from(wrapped), pool_size));
    }

    let scheduler = Scheduler::new(stages);
    Ok(Pipeline { scheduler, sources })
}

fn duplicate_check(seen: &mut HashSet<String>, kind: ComponentKind, id: &str) -> Result<(), ConfigError> {
    if !seen.insert(id.to_string()) {
        return Err(ConfigError::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn build_sources(
    entries: &[ComponentConfigEntry],
    registry: &Registry,
    env: &Env,
    suppress_invalid_keys: bool,
) -> Result<Vec<Box<dyn Source>>, PipelineError> {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(entries.len());
    for entry in entries {
        duplicate_check(&mut seen, ComponentKind::Source, &entry.id)?;
        let mut source = registry.make_source(&entry.id).ok_or_else(|| ConfigError::UnknownId {
            kind: ComponentKind::Source,
            id: entry.id.clone(),
        })?;
        if !source.load_preferences(&entry.settings, env) {
            if suppress_invalid_keys {
                warn!(id = %entry.id, "source rejected its configuration, skipping");
                continue;
            }
            return Err(ConfigError::Rejected {
                kind: ComponentKind::Source,
                id: entry.id.clone(),
            }
            .into());
        }
        source.initialize().map_err(|source_err| InitError {
            kind: ComponentKind::Source,
            id: entry.id.clone(),
            source: source_err,
        })?;
        built.push(source);
    }
    Ok(built)
}

fn build_sinks(
    entries: &[ComponentConfigEntry],
    registry: &Registry,
    env: &Env,
    suppress_invalid_keys: bool,
) -> Result<Vec<Box<dyn Sink>>, PipelineError> {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(entries.len());
    for entry in entries {
        duplicate_check(&mut seen, ComponentKind::Sink, &entry.id)?;
        let mut sink = registry.make_sink(&entry.id).ok_or_else(|| ConfigError::UnknownId {
            kind: ComponentKind::Sink,
            id: entry.id.clone(),
        })?;
        if !sink.load_preferences(&entry.settings, env) {
            if suppress_invalid_keys {
                warn!(id = %entry.id, "sink rejected its configuration, skipping");
                continue;
            }
            return Err(ConfigError::Rejected {
                kind: ComponentKind::Sink,
                id: entry.id.clone(),
            }
            .into());
        }
        sink.initialize().map_err(|source_err| InitError {
            kind: ComponentKind::Sink,
            id: entry.id.clone(),
            source: source_err,
        })?;
        built.push(sink);
    }
    Ok(built)
}

fn build_tasks(
    entries: &[ComponentConfigEntry],
    registry: &Registry,
    env: &Env,
    suppress_invalid_keys: bool,
) -> Result<Vec<Box<dyn Task>>, PipelineError> {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(entries.len());
    for entry in entries {
        duplicate_check(&mut seen, ComponentKind::Task, &entry.id)?;
        let mut task = registry.make_task(&entry.id).ok_or_else(|| ConfigError::UnknownId {
            kind: ComponentKind::Task,
            id: entry.id.clone(),
        })?;
        if !task.load_preferences(&entry.settings, env) {
            if suppress_invalid_keys {
                warn!(id = %entry.id, "task rejected its configuration, skipping");
                continue;
            }
            return Err(ConfigError::Rejected {
                kind: ComponentKind::Task,
                id: entry.id.clone(),
            }
            .into());
        }
        task.initialize().map_err(|source_err| InitError {
            kind: ComponentKind::Task,
            id: entry.id.clone(),
            source: source_err,
        })?;
        built.push(task);
    }
    if built.is_empty() {
        return Err(ConfigError::NoTasks.into());
    }
    Ok(built)
}
