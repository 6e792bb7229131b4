//! Sudo credential priming and keep-alive.

use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};

/// How often the cached sudo credential is refreshed. The default sudo
/// timestamp timeout is 5 minutes, so 4 keeps it warm with margin.
const REFRESH_INTERVAL: Duration = Duration::from_secs(240);

/// Prime sudo credentials and keep them fresh for the process lifetime.
///
/// Runs `sudo -v` once (interactive, may prompt), then spawns a detached
/// thread that re-validates non-interactively every four minutes. The
/// thread is never joined; it dies with the process.
///
/// # Errors
///
/// Returns an error if `sudo` cannot be spawned or the initial validation
/// fails (wrong password, no sudo rights).
pub fn ensure_sudo_keepalive() -> Result<()> {
    let status = Command::new("sudo")
        .arg("-v")
        .status()
        .context("failed to run 'sudo -v'")?;
    if !status.success() {
        bail!("could not acquire sudo credentials");
    }

    std::thread::spawn(|| loop {
        std::thread::sleep(REFRESH_INTERVAL);
        if let Err(e) = Command::new("sudo").args(["-n", "-v"]).status() {
            tracing::warn!("sudo keep-alive refresh failed: {e}");
        }
    });

    Ok(())
}
