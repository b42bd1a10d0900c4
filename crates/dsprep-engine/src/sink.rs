use dsprep_core::{Env, WorkItem};

pub type SinkConfig = toml::Table;

/// A destination for finished [`WorkItem`]s.
pub trait Sink: Send + Sync {
    fn id(&self) -> &str;

    fn load_preferences(&mut self, config: &SinkConfig, env: &Env) -> bool {
        let _ = (config, env);
        true
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Persist the item. `Ok(false)` and `Err` are both treated as a
    /// failed save by the sink stage; the distinction is for the
    /// implementer's own logging.
    fn save(&self, item: &mut WorkItem) -> anyhow::Result<bool>;
}
