use dsprep_core::{Env, WorkItem};

pub type SourceConfig = toml::Table;

/// A producer of [`WorkItem`]s. `next` may yield incrementally; each item
/// is transferred by ownership to the `Driver`.
pub trait Source: Send + Sync {
    fn id(&self) -> &str;

    fn load_preferences(&mut self, config: &SourceConfig, env: &Env) -> bool {
        let _ = (config, env);
        true
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// A finite, possibly lazily-produced, sequence of work items.
    fn next(&self) -> Box<dyn Iterator<Item = WorkItem> + '_>;
}
