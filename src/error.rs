//! Typed errors for the build engine.
//!
//! Configuration and graph problems are fatal and surface as [`ConfigError`]
//! before any node executes. Node execution uses `anyhow::Result` so that
//! shell failures carry context; the one distinguished case is
//! [`SkipSignal`], which the scheduler downcasts to record a node as
//! Skipped rather than Failed.

use thiserror::Error;

/// Fatal errors raised while loading configuration or building the graph.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A config file is not valid YAML or does not match the schema.
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// An `include` chain loops back on itself.
    #[error("cyclic include detected at {0}")]
    CyclicInclude(String),

    /// Two nodes share the same id.
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    /// A node depends on an id that no node declares.
    #[error("node '{node}' depends on missing node '{dep}'")]
    MissingDependency { node: String, dep: String },

    /// The dependency graph contains a cycle.
    #[error("detected cycle in dependency graph involving nodes: [{}]", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Sentinel meaning "the desired state already held", which is not a failure.
///
/// Install paths return this when a check shows a package is present, file
/// nodes when the destination is already linked or identical, and tasks
/// when their `check` resolves to the skip action. The scheduler records
/// it as a Skipped result, which satisfies dependents just like Success.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SkipSignal(pub String);

impl SkipSignal {
    /// Build a skip error wrapped in `anyhow::Error`, ready to return from
    /// a node's execute path.
    pub fn because(reason: impl Into<String>) -> anyhow::Error {
        Self(reason.into()).into()
    }
}

/// If `err` is a [`SkipSignal`] (at any depth of the chain), return its reason.
pub fn as_skip(err: &anyhow::Error) -> Option<&str> {
    err.downcast_ref::<SkipSignal>().map(|s| s.0.as_str())
}
