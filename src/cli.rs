use std::path::PathBuf;

use clap::Parser;

/// Command-line surface for the build engine.
#[derive(Parser, Debug)]
#[command(
    name = "dotbuilder",
    about = "Declarative host provisioning from a single YAML document",
    version
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short = 'c', long = "config", default_value = "configs/construct.yaml")]
    pub config: PathBuf,

    /// Enable debug logs
    #[arg(long)]
    pub debug: bool,

    /// Simulate the run without mutating the system
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
}
