//! The uniform node contract and its three adapters.
//!
//! Packages, files, and tasks all present the same face to the scheduler:
//! an id, dependency ids, an optional batch group, and an execute action.
//! Package nodes additionally contribute a *batch item* (the resolved
//! native package names) so compatible installs can coalesce into one
//! manager invocation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{File, Package, Task};
use crate::exec::Runner;
use crate::files::{self, FileSystem};
use crate::pm::PackageEngine;
use crate::tasks;

/// Shared state handed to every executing node.
pub struct Context {
    pub runner: Arc<dyn Runner>,
    pub engine: Arc<PackageEngine>,
    pub vars: BTreeMap<String, String>,
    /// Directory of the config file; relative file sources resolve here.
    pub base_dir: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub dry_run: bool,
}

/// A schedulable unit of work.
pub trait Node: Send + Sync {
    /// Unique id within the run.
    fn id(&self) -> &str;

    /// Ids of nodes that must complete (Success or Skipped) first.
    fn deps(&self) -> &[String];

    /// Batch group name; empty means the node always runs alone.
    fn batch_group(&self) -> String {
        String::new()
    }

    /// Contribution to a batched install, when the node supports batching.
    fn batch_item(&self) -> Option<String> {
        None
    }

    /// Run the node to completion.
    ///
    /// # Errors
    ///
    /// A [`SkipSignal`](crate::error::SkipSignal) marks the node Skipped;
    /// any other error marks it Failed.
    fn execute(&self, ctx: &Context) -> Result<()>;
}

/// A package install.
pub struct PkgNode {
    pkg: Package,
    engine: Arc<PackageEngine>,
}

impl PkgNode {
    #[must_use]
    pub fn new(pkg: Package, engine: Arc<PackageEngine>) -> Self {
        Self { pkg, engine }
    }
}

impl Node for PkgNode {
    fn id(&self) -> &str {
        if self.pkg.name.is_empty() {
            &self.pkg.def
        } else {
            &self.pkg.name
        }
    }

    fn deps(&self) -> &[String] {
        &self.pkg.deps
    }

    fn batch_group(&self) -> String {
        self.engine.batch_manager(&self.pkg).unwrap_or_default()
    }

    fn batch_item(&self) -> Option<String> {
        Some(self.engine.resolve_name(&self.pkg))
    }

    fn execute(&self, ctx: &Context) -> Result<()> {
        ctx.engine.install_one(&self.pkg)
    }
}

/// A dotfile link, render, or append.
pub struct FileNode {
    file: File,
    id: String,
}

impl FileNode {
    #[must_use]
    pub fn new(file: File) -> Self {
        let id = file.node_id();
        Self { file, id }
    }
}

impl Node for FileNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn deps(&self) -> &[String] {
        &self.file.deps
    }

    fn execute(&self, ctx: &Context) -> Result<()> {
        files::process_file(
            &self.file,
            &ctx.vars,
            ctx.fs.as_ref(),
            ctx.runner.as_ref(),
            &ctx.base_dir,
            ctx.dry_run,
        )
    }
}

/// An arbitrary shell task.
pub struct TaskNode {
    task: Task,
}

impl TaskNode {
    #[must_use]
    pub fn new(task: Task) -> Self {
        Self { task }
    }
}

impl Node for TaskNode {
    fn id(&self) -> &str {
        &self.task.id
    }

    fn deps(&self) -> &[String] {
        &self.task.deps
    }

    fn execute(&self, ctx: &Context) -> Result<()> {
        tasks::run_task(&self.task, ctx.runner.as_ref(), &ctx.vars)
    }
}
