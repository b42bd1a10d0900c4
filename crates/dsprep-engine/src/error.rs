use std::fmt;

/// Which kind of component a [`ConfigError`]/[`InitError`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Task,
    Source,
    Sink,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::Task => "task",
            ComponentKind::Source => "source",
            ComponentKind::Sink => "sink",
        };
        f.write_str(s)
    }
}

/// Fatal at pipeline construction time — the pipeline never starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown {kind} id '{id}'")]
    UnknownId { kind: ComponentKind, id: String },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: ComponentKind, id: String },

    #[error("{kind} '{id}' rejected its configuration")]
    Rejected { kind: ComponentKind, id: String },

    #[error("no tasks configured")]
    NoTasks,
}

/// A component's `initialize()` failed. Fatal; the pipeline shuts down
/// before accepting any input.
#[derive(Debug, thiserror::Error)]
#[error("initializing {kind} '{id}'")]
pub struct InitError {
    pub kind: ComponentKind,
    pub id: String,
    #[source]
    pub source: anyhow::Error,
}

/// Either stage of pipeline assembly can fail fatally; this is what
/// `build_pipeline` returns.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Init(#[from] InitError),
}

/// A fault raised out of [`crate::task::Task::process`]. Counted as one
/// retry attempt by the stage that invoked it; never propagated past the
/// worker loop.
#[derive(Debug, thiserror::Error)]
#[error("task fault: {0}")]
pub struct TransientTaskError(#[from] anyhow::Error);
