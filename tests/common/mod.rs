// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed build fixture: a YAML document is
// written next to its source files, loaded through the real config path,
// and executed with the real shell runner and filesystem. Package nodes
// are exercised at the unit level with a mock runner; these fixtures are
// for file and task scenarios that can safely run real `sh` commands.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotbuilder::config::{self, Config};
use dotbuilder::error::ConfigError;
use dotbuilder::exec::{Runner, ShellRunner};
use dotbuilder::files::RealFs;
use dotbuilder::nodes::{Context, FileNode, Node, PkgNode, TaskNode};
use dotbuilder::platform::SystemInfo;
use dotbuilder::pm::PackageEngine;
use dotbuilder::scheduler::{self, NodeResult};

/// A [`Runner`] that records every command and reports every silent
/// check as "not installed", for asserting on exact command strings.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub streamed: std::sync::Mutex<Vec<String>>,
    pub silent: std::sync::Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn streamed_commands(&self) -> Vec<String> {
        self.streamed.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn silent_commands(&self) -> Vec<String> {
        self.silent.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Runner for RecordingRunner {
    fn exec_stream(&self, cmd: &str, _id: &str) -> anyhow::Result<()> {
        if let Ok(mut guard) = self.streamed.lock() {
            guard.push(cmd.to_string());
        }
        Ok(())
    }

    fn exec_silent(&self, cmd: &str) -> i32 {
        if let Ok(mut guard) = self.silent.lock() {
            guard.push(cmd.to_string());
        }
        1
    }
}

/// An isolated build rooted in a temp directory.
pub struct BuildFixture {
    dir: tempfile::TempDir,
}

impl BuildFixture {
    /// Create a fixture and write `construct.yaml` into its root.
    pub fn new(yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("construct.yaml"), yaml).expect("write config");
        Self { dir }
    }

    /// Root directory (config dir and base dir for relative sources).
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a source file next to the config.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Load the config and execute every declared node.
    pub fn run(&self) -> Result<HashMap<String, NodeResult>, ConfigError> {
        let (nodes, ctx) = self.build()?;
        scheduler::run(&nodes, &ctx)
    }

    /// Load the config and return the node list plus context, for tests
    /// that also need the summary printer.
    pub fn build(&self) -> Result<(Vec<Box<dyn Node>>, Context), ConfigError> {
        let cfg = Config::load(&self.dir.path().join("construct.yaml"))?;
        Ok(assemble(&cfg, self.dir.path()))
    }
}

/// Wire up nodes and context the way the binary does, with a fixed test
/// platform so no detection touches the host.
fn assemble(cfg: &Config, base_dir: &Path) -> (Vec<Box<dyn Node>>, Context) {
    let sys = SystemInfo::new("linux", "debian", "apt-get");

    let mut vars = cfg.vars.clone();
    config::seed_vars(&mut vars, &sys);
    config::resolve_vars(&mut vars);

    let runner: Arc<dyn Runner> = Arc::new(ShellRunner::new(false));
    let mut engine = PackageEngine::new(sys, vars.clone(), true, Arc::clone(&runner));
    engine.register_custom_managers(&cfg.pkgs);
    let engine = Arc::new(engine);

    let mut nodes: Vec<Box<dyn Node>> = Vec::new();
    for pkg in &cfg.pkgs {
        nodes.push(Box::new(PkgNode::new(pkg.clone(), Arc::clone(&engine))));
    }
    for file in &cfg.files {
        nodes.push(Box::new(FileNode::new(file.clone())));
    }
    for task in &cfg.tasks {
        nodes.push(Box::new(TaskNode::new(task.clone())));
    }

    let ctx = Context {
        runner,
        engine,
        vars,
        base_dir: base_dir.to_path_buf(),
        fs: Arc::new(RealFs),
        dry_run: false,
    };
    (nodes, ctx)
}
