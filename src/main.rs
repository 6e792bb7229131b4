use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use dotbuilder::exec::{Runner, ShellRunner};
use dotbuilder::files::{DryRunFs, FileSystem, RealFs};
use dotbuilder::nodes::{Context, FileNode, Node, PkgNode, TaskNode};
use dotbuilder::pm::PackageEngine;
use dotbuilder::{cli, config, logging, platform, privileges, scheduler, scripts};

fn main() -> ExitCode {
    let args = cli::Cli::parse();
    logging::init(args.debug);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &cli::Cli) -> Result<()> {
    if args.dry_run {
        tracing::warn!("running in dry-run mode: no changes will be applied");
    }

    tracing::info!("loading configuration: {}", args.config.display());
    let cfg = config::Config::load(&args.config)?;
    if !cfg.meta.name.is_empty() {
        tracing::info!("build target: {} (v{})", cfg.meta.name, cfg.meta.ver);
    }

    let sys = platform::SystemInfo::detect();
    let is_root = platform::is_root();
    tracing::info!(
        "environment: os={} distro={} base_pm={} root={is_root}",
        sys.os,
        sys.distro,
        sys.base_pm
    );

    if !is_root && !args.dry_run {
        privileges::ensure_sudo_keepalive()?;
    }

    let mut vars = cfg.vars.clone();
    config::seed_vars(&mut vars, &sys);
    config::resolve_vars(&mut vars);

    let mut runner = ShellRunner::new(args.dry_run);
    if let Some(dir) = scripts::stage(&cfg.scripts, &vars)? {
        runner.prepend_path(&dir);
    }
    let runner: Arc<dyn Runner> = Arc::new(runner);

    let mut engine = PackageEngine::new(sys, vars.clone(), is_root, Arc::clone(&runner));
    engine.register_custom_managers(&cfg.pkgs);
    let engine = Arc::new(engine);

    let base_dir = args
        .config
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let fs: Arc<dyn FileSystem> = if args.dry_run {
        Arc::new(DryRunFs)
    } else {
        Arc::new(RealFs)
    };

    let mut node_list: Vec<Box<dyn Node>> = Vec::new();
    for pkg in &cfg.pkgs {
        node_list.push(Box::new(PkgNode::new(pkg.clone(), Arc::clone(&engine))));
    }
    for file in &cfg.files {
        node_list.push(Box::new(FileNode::new(file.clone())));
    }
    for task in &cfg.tasks {
        node_list.push(Box::new(TaskNode::new(task.clone())));
    }

    let ctx = Context {
        runner,
        engine,
        vars,
        base_dir,
        fs,
        dry_run: args.dry_run,
    };

    let results = scheduler::run(&node_list, &ctx)?;
    let clean = scheduler::print_summary(&results, &node_list);
    if !clean {
        anyhow::bail!("build finished with errors");
    }

    tracing::info!("all build tasks completed");
    Ok(())
}
