use std::collections::HashMap;

use crate::sink::Sink;
use crate::source::Source;
use crate::task::Task;

type TaskCtor = Box<dyn Fn() -> Box<dyn Task> + Send + Sync>;
type SourceCtor = Box<dyn Fn() -> Box<dyn Source> + Send + Sync>;
type SinkCtor = Box<dyn Fn() -> Box<dyn Sink> + Send + Sync>;

/// Explicit constructor table, keyed by component id. Replaces the
/// original implementation's package-scan-and-reflect discovery: every
/// task/source/sink a pipeline can use is registered here at startup, and
/// unknown ids surface as [`crate::error::ConfigError::UnknownId`] instead
/// of silently failing to load.
#[derive(Default)]
pub struct Registry {
    tasks: HashMap<String, TaskCtor>,
    sources: HashMap<String, SourceCtor>,
    sinks: HashMap<String, SinkCtor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_task<F>(&mut self, id: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.tasks.insert(id.into(), Box::new(ctor));
        self
    }

    pub fn register_source<F>(&mut self, id: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Source> + Send + Sync + 'static,
    {
        self.sources.insert(id.into(), Box::new(ctor));
        self
    }

    pub fn register_sink<F>(&mut self, id: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Sink> + Send + Sync + 'static,
    {
        self.sinks.insert(id.into(), Box::new(ctor));
        self
    }

    pub(crate) fn make_task(&self, id: &str) -> Option<Box<dyn Task>> {
        self.tasks.get(id).map(|ctor| ctor())
    }

    pub(crate) fn make_source(&self, id: &str) -> Option<Box<dyn Source>> {
        self.sources.get(id).map(|ctor| ctor())
    }

    pub(crate) fn make_sink(&self, id: &str) -> Option<Box<dyn Sink>> {
        self.sinks.get(id).map(|ctor| ctor())
    }
}
