//! Shell command execution.
//!
//! Every external command runs under `sh -c`. Two modes exist: *stream*,
//! which relays child output line-by-line with a colored `[id]` prefix, and
//! *silent*, which captures output and reports only the exit code. A
//! process-global output mutex keeps concurrent workers from interleaving
//! within a line.
//!
//! Dry-run behavior is asymmetric on purpose: streamed commands print a
//! `[PLAN]` line and succeed, while silent commands report exit code 1 so
//! that install logic treats nothing as "already installed" and falls
//! through to its plan step.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context as _, Result};

/// Serializes console output from concurrent workers.
static OUTPUT: Mutex<()> = Mutex::new(());

fn output_lock() -> MutexGuard<'static, ()> {
    OUTPUT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executes command strings under a POSIX shell.
///
/// A trait so that the package engine, file manager, and task logic can be
/// exercised in tests with a mock that never spawns a process.
pub trait Runner: Send + Sync {
    /// Run `cmd`, relaying each output line prefixed with `[id]`. Blocks
    /// until the child exits; a non-zero exit is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the child cannot be spawned or exits non-zero.
    fn exec_stream(&self, cmd: &str, id: &str) -> Result<()>;

    /// Run `cmd`, capturing all output, and return its exit code. A spawn
    /// failure reports 1.
    fn exec_silent(&self, cmd: &str) -> i32;
}

/// The real [`Runner`]: spawns `sh -c` with the process environment plus
/// any overrides (notably a `PATH` extended with the staged scripts
/// directory).
#[derive(Debug, Default)]
pub struct ShellRunner {
    env: HashMap<String, String>,
    dry_run: bool,
}

impl ShellRunner {
    /// Create a runner with no environment overrides.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            env: HashMap::new(),
            dry_run,
        }
    }

    /// Prepend `dir` to the `PATH` seen by every spawned command.
    pub fn prepend_path(&mut self, dir: &Path) {
        let current = self
            .env
            .get("PATH")
            .cloned()
            .or_else(|| std::env::var("PATH").ok())
            .unwrap_or_default();
        self.env
            .insert("PATH".to_string(), format!("{}:{current}", dir.display()));
    }

    fn command(&self, cmd: &str) -> Command {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd).envs(&self.env);
        c
    }
}

impl Runner for ShellRunner {
    fn exec_stream(&self, cmd: &str, id: &str) -> Result<()> {
        let cmd_display = display_command(cmd);

        if self.dry_run {
            let _guard = output_lock();
            println!("\x1b[36m[PLAN][{id}]\x1b[0m {cmd_display}");
            return Ok(());
        }

        tracing::debug!("[{id}] exec: {cmd_display}");

        let mut child = self
            .command(cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn command for '{id}'"))?;

        let stdout = child
            .stdout
            .take()
            .with_context(|| format!("no stdout pipe for '{id}'"))?;
        let stderr = child
            .stderr
            .take()
            .with_context(|| format!("no stderr pipe for '{id}'"))?;

        std::thread::scope(|s| {
            s.spawn(|| stream_lines(BufReader::new(stdout), id, false));
            s.spawn(|| stream_lines(BufReader::new(stderr), id, true));
        });

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for command of '{id}'"))?;
        if !status.success() {
            bail!(
                "command for '{id}' exited with code {}",
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }

    fn exec_silent(&self, cmd: &str) -> i32 {
        if self.dry_run {
            return 1;
        }

        tracing::debug!("silent: {}", display_command(cmd));

        match self.command(cmd).output() {
            Ok(output) => {
                let combined = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                if !combined.trim().is_empty() {
                    tracing::debug!("  -> check output: {}", combined.trim());
                }
                if output.status.success() {
                    0
                } else {
                    output.status.code().unwrap_or(1)
                }
            }
            Err(_) => 1,
        }
    }
}

fn stream_lines<R: BufRead>(reader: R, id: &str, is_err: bool) {
    let prefix_color = if is_err { "\x1b[31m" } else { "\x1b[34m" };
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let _guard = output_lock();
        println!("{prefix_color}[{id}]\x1b[0m {line}");
    }
}

/// Shorten multi-line commands for display: first line plus a line count.
#[must_use]
pub fn display_command(cmd: &str) -> String {
    let trimmed = cmd.trim();
    let mut lines = trimmed.lines();
    let first = lines.next().unwrap_or_default().trim();
    let rest = lines.count();
    if rest == 0 {
        first.to_string()
    } else {
        format!("{first} ... ({} lines)", rest + 1)
    }
}
