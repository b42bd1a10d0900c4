//! Shared domain types for the dataset-preprocessing pipeline.
//!
//! This crate holds the pieces every other crate in the workspace needs:
//! the [`WorkItem`] that flows through the pipeline, the lazy image
//! abstraction it wraps, and the task-kind taxonomy used to size worker
//! pools per stage.

mod item;
mod kind;

pub use item::{ImageSource, ItemError, WorkItem};
pub use kind::TaskKind;

/// Shared secrets/values handed to every `load_preferences` call (API keys
/// and the like). Keys are opaque strings; interpretation is up to the
/// component reading them.
pub type Env = std::collections::HashMap<String, String>;
