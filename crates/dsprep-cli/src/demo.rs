//! Minimal task/source/sink implementations so a freshly checked-out
//! pipeline.toml has something to register and run. Not meant as
//! production preprocessing steps.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use dsprep_core::{Env, TaskKind, WorkItem};
use dsprep_engine::{Registry, Sink, SinkConfig, Source, SourceConfig, Task, TransientTaskError};

/// Reads every regular file in a directory as one [`WorkItem`]'s image
/// bytes. Configured via `path = "..."` in its `[[input]]` table.
pub struct DirectorySource {
    path: Mutex<PathBuf>,
}

impl DirectorySource {
    pub fn new() -> Self {
        Self {
            path: Mutex::new(PathBuf::new()),
        }
    }
}

impl Source for DirectorySource {
    fn id(&self) -> &str {
        "directory"
    }

    fn load_preferences(&mut self, config: &SourceConfig, _env: &Env) -> bool {
        let Some(path) = config.get("path").and_then(|v| v.as_str()) else {
            return false;
        };
        *self.path.lock().expect("path mutex poisoned") = PathBuf::from(path);
        true
    }

    fn next(&self) -> Box<dyn Iterator<Item = WorkItem> + '_> {
        let dir = self.path.lock().expect("path mutex poisoned").clone();
        let entries = fs::read_dir(&dir).into_iter().flatten();
        Box::new(entries.filter_map(|entry| {
            let entry = entry.ok()?;
            if !entry.file_type().ok()?.is_file() {
                return None;
            }
            let bytes = fs::read(entry.path()).ok()?;
            Some(WorkItem::from_bytes(bytes))
        }))
    }
}

/// Replaces an item's image with its grayscale view. Always accepts.
pub struct GrayscaleTask;

impl Task for GrayscaleTask {
    fn id(&self) -> &str {
        "grayscale"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Cpu
    }

    fn process(&self, item: &mut WorkItem) -> Result<bool, TransientTaskError> {
        let gray = item.grayscale().map_err(anyhow::Error::from)?.to_vec();
        item.set_image(gray).map_err(anyhow::Error::from)?;
        Ok(true)
    }
}

/// Writes each item's image bytes to `<path>/<n>.bin`. Configured via
/// `path = "..."` in its `[[output]]` table.
pub struct DirectorySink {
    path: Mutex<PathBuf>,
    counter: Mutex<u64>,
}

impl DirectorySink {
    pub fn new() -> Self {
        Self {
            path: Mutex::new(PathBuf::new()),
            counter: Mutex::new(0),
        }
    }
}

impl Sink for DirectorySink {
    fn id(&self) -> &str {
        "directory"
    }

    fn load_preferences(&mut self, config: &SinkConfig, _env: &Env) -> bool {
        let Some(path) = config.get("path").and_then(|v| v.as_str()) else {
            return false;
        };
        *self.path.lock().expect("path mutex poisoned") = PathBuf::from(path);
        true
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        fs::create_dir_all(&*self.path.lock().expect("path mutex poisoned"))?;
        Ok(())
    }

    fn save(&self, item: &mut WorkItem) -> anyhow::Result<bool> {
        let mut counter = self.counter.lock().expect("counter mutex poisoned");
        let dir = self.path.lock().expect("path mutex poisoned").clone();
        let bytes = item.image()?.to_vec();
        fs::write(dir.join(format!("{counter}.bin")), bytes)?;
        *counter += 1;
        Ok(true)
    }
}

pub fn register_demo_components(registry: &mut Registry) {
    registry.register_source("directory", || Box::new(DirectorySource::new()));
    registry.register_task("grayscale", || Box::new(GrayscaleTask));
    registry.register_sink("directory", || Box::new(DirectorySink::new()));
}
