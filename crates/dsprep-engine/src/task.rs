use dsprep_core::{Env, TaskKind, WorkItem};

use crate::error::TransientTaskError;

/// Raw per-task settings, the slice of the config file's `tasks.<id>` table.
pub type TaskConfig = toml::Table;

/// A pure stage descriptor: identity, resource kind, desired pool size,
/// retry count, optional throughput ceiling. Implementations are
/// registered in a [`crate::registry::Registry`] and instantiated once at
/// config time.
///
/// `load_preferences` and `initialize` run on the pipeline's construction
/// thread, strictly before the task is wrapped in `Arc` and handed to its
/// stage's workers — after that point every method here must tolerate
/// concurrent invocation on distinct [`WorkItem`]s.
pub trait Task: Send + Sync {
    /// Stable identifier, unique within a pipeline.
    fn id(&self) -> &str;

    /// Human-readable name. Defaults to [`Task::id`].
    fn name(&self) -> &str {
        self.id()
    }

    fn kind(&self) -> TaskKind;

    /// Worker pool size, or `None` to use the kind's configured default.
    fn desired_pool_size(&self) -> Option<usize> {
        None
    }

    /// Retry budget for a single item. Must be at least 1.
    fn max_attempts(&self) -> u32 {
        1
    }

    /// Soft throughput ceiling in items/minute, or `None` for unlimited.
    fn max_ipm(&self) -> Option<u32> {
        None
    }

    fn priority(&self) -> i32 {
        0
    }

    /// Validate and store configuration. Returns `false` if the task is
    /// unusable (missing required keys, invalid values) — pure, no side
    /// effects beyond storing configuration.
    fn load_preferences(&mut self, config: &TaskConfig, env: &Env) -> bool {
        let _ = (config, env);
        true
    }

    /// One-time setup (resource acquisition, model loading).
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Map an item to accept (`Ok(true)`, forwarded) or reject (`Ok(false)`,
    /// dropped). A raised fault (`Err`) is a retryable failure from the
    /// stage's point of view. Must be safe for concurrent invocation on
    /// distinct work items and must not retain references to `item` after
    /// returning.
    fn process(&self, item: &mut WorkItem) -> Result<bool, TransientTaskError>;
}
