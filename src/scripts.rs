//! Helper-script staging.
//!
//! Script bodies declared in the configuration are rendered with the
//! global variables and written, executable, into a fresh directory under
//! the system temp path. The runner prepends that directory to `PATH` so
//! install and check commands can invoke helpers by bare name.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::template::{render, TemplateData};

/// Render and write all helper scripts, returning the staging directory,
/// or `None` when no scripts are declared. The directory is recreated on
/// every run.
///
/// # Errors
///
/// Returns an error when the directory or a script file cannot be written.
pub fn stage(
    scripts: &BTreeMap<String, String>,
    vars: &BTreeMap<String, String>,
) -> Result<Option<PathBuf>> {
    if scripts.is_empty() {
        return Ok(None);
    }

    let dir = std::env::temp_dir().join("dotbuilder-scripts");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create script directory {}", dir.display()))?;

    tracing::info!("staging {} helper script(s) in {}", scripts.len(), dir.display());

    let data = TemplateData::new().vars(vars);
    for (name, body) in scripts {
        let path = dir.join(name);
        std::fs::write(&path, render(body, &data))
            .with_context(|| format!("failed to write script {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .with_context(|| format!("failed to chmod script {}", path.display()))?;
        }
    }

    Ok(Some(dir))
}
