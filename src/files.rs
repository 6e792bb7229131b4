//! File node processing: link, render, or append dotfiles into place.
//!
//! All mutations go through the [`FileSystem`] capability so a dry run can
//! log intent instead of touching disk. Reads (stat, readlink, content)
//! stay real in every implementation: skip decisions must be correct even
//! when nothing is written.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};

use crate::config::File;
use crate::error::SkipSignal;
use crate::exec::Runner;
use crate::template::{render, TemplateData};

/// Filesystem operations used by file nodes.
pub trait FileSystem: Send + Sync {
    /// Create a directory and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// Create a symlink at `link` pointing to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error when the link cannot be created.
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Remove a file or symlink.
    ///
    /// # Errors
    ///
    /// Returns an error when removal fails.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Write `content` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Append `content` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be appended to.
    fn append(&self, path: &Path, content: &str) -> Result<()>;

    /// Read a file to a string. Real in all implementations.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read.
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
    }

    /// Metadata without following symlinks. Real in all implementations.
    fn symlink_metadata(&self, path: &Path) -> io::Result<std::fs::Metadata> {
        std::fs::symlink_metadata(path)
    }

    /// Target of a symlink. Real in all implementations.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }
}

/// The real filesystem.
#[derive(Debug, Default)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn mkdir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link).with_context(|| {
                format!("failed to link {} -> {}", link.display(), target.display())
            })
        }
        #[cfg(not(unix))]
        {
            bail!(
                "symlinks are not supported on this platform ({} -> {})",
                link.display(),
                target.display()
            )
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        use std::io::Write as _;
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open {} for append", path.display()))?;
        f.write_all(content.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))
    }
}

/// Dry-run filesystem: logs each intended mutation and reports success.
#[derive(Debug, Default)]
pub struct DryRunFs;

impl FileSystem for DryRunFs {
    fn mkdir_all(&self, path: &Path) -> Result<()> {
        tracing::debug!("[plan] mkdir -p {}", path.display());
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        tracing::info!("[plan] ln -s {} {}", target.display(), link.display());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        tracing::info!("[plan] rm {}", path.display());
        Ok(())
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        tracing::info!("[plan] write {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        tracing::info!("[plan] append {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        // A source may be produced by an earlier node that did not really
        // run; simulate its content instead of failing the plan.
        if !path.exists() {
            tracing::warn!("[plan] source not found, simulating read: {}", path.display());
            return Ok("dry-run-content".to_string());
        }
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
    }
}

/// Process one file node to completion.
///
/// # Errors
///
/// Returns [`SkipSignal`] when the desired state already holds (check
/// passed, already linked, identical or already-appended content, or an
/// existing target that may not be overwritten), and an ordinary error on
/// invalid configuration or any filesystem failure.
pub fn process_file(
    file: &File,
    vars: &BTreeMap<String, String>,
    fs: &dyn FileSystem,
    runner: &dyn Runner,
    base_dir: &Path,
    dry_run: bool,
) -> Result<()> {
    let data = TemplateData::new().vars(vars);

    if !file.check.is_empty() && runner.exec_silent(&render(&file.check, &data)) == 0 {
        return Err(SkipSignal::because("check passed"));
    }

    if file.overwrite && file.append {
        bail!("'override' and 'append' are mutually exclusive");
    }

    let src = resolve_path(&render(&file.src, &data), Some(base_dir));
    let dest = resolve_path(&render(&file.dest, &data), None);

    tracing::info!("file: {} -> {}", dest.display(), src.display());

    let raw = fs
        .read_to_string(&src)
        .with_context(|| format!("failed to read source {}", src.display()))?;
    let content = if file.tpl { render(&raw, &data) } else { raw };

    if let Some(parent) = dest.parent() {
        fs.mkdir_all(parent)?;
    }

    let dest_meta = fs.symlink_metadata(&dest).ok();

    if let Some(meta) = &dest_meta {
        if !file.tpl && meta.file_type().is_symlink() {
            if let Ok(target) = fs.read_link(&dest) {
                if target == src {
                    return Err(SkipSignal::because("already linked"));
                }
            }
        }
        if file.tpl || file.overwrite {
            if let Ok(existing) = fs.read_to_string(&dest) {
                if existing == content {
                    return Err(SkipSignal::because("identical content"));
                }
            }
        }
    }

    if file.append {
        if dest_meta.is_none() {
            fs.write(&dest, &content)?;
            return Ok(());
        }
        let existing = fs
            .read_to_string(&dest)
            .with_context(|| format!("failed to read {}", dest.display()))?;
        if existing.contains(&content) {
            return Err(SkipSignal::because("already appended"));
        }
        let mut chunk = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            chunk.push('\n');
        }
        chunk.push_str(&content);
        fs.append(&dest, &chunk)?;
        return Ok(());
    }

    if dest_meta.is_some() {
        let allowed = file.overwrite
            && (file.override_if.is_empty()
                || dry_run
                || runner.exec_silent(&render(&file.override_if, &data)) == 0);
        if !allowed {
            return Err(SkipSignal::because("target exists"));
        }
        fs.remove(&dest)?;
    }

    if file.tpl {
        fs.write(&dest, &content)?;
    } else {
        fs.symlink(&src, &dest)?;
    }
    Ok(())
}

/// Expand `~` and `$VAR` in a raw path. When `base_dir` is given, a path
/// that is still relative after expansion resolves against it.
fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::full(raw)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| shellexpand::tilde(raw).into_owned());
    let path = PathBuf::from(expanded);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
