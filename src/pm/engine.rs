//! The package install engine.
//!
//! Resolves which command installs a package (custom manager template,
//! language-manager triple, or base-manager template), deduplicates
//! metadata refreshes to one per manager per run, and serializes every
//! install through its manager's lock group so that two commands sharing a
//! package database are never in flight together.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Result};

use crate::config::Package;
use crate::error::SkipSignal;
use crate::exec::Runner;
use crate::platform::SystemInfo;
use crate::pm::registry;
use crate::template::{render, TemplateData};

/// Outcome of a single install attempt through one manager.
enum CoreOutcome {
    /// The check showed the package was already present.
    AlreadyInstalled,
    /// The install command ran and succeeded.
    Installed,
}

/// Process-wide install engine shared by all package nodes.
pub struct PackageEngine {
    sys: SystemInfo,
    vars: BTreeMap<String, String>,
    is_root: bool,
    runner: Arc<dyn Runner>,
    /// User-declared custom managers, keyed by the declaring package name.
    custom: HashMap<String, Package>,
    /// Managers whose metadata refresh already ran this process.
    updated: Mutex<HashSet<String>>,
    /// Lazily created mutex per lock-group name.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PackageEngine {
    /// Create an engine for one run.
    #[must_use]
    pub fn new(
        sys: SystemInfo,
        vars: BTreeMap<String, String>,
        is_root: bool,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self {
            sys,
            vars,
            is_root,
            runner,
            custom: HashMap::new(),
            updated: Mutex::new(HashSet::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Record every package with a non-empty `pmi` as a custom manager
    /// other packages can name in their `manager` field.
    pub fn register_custom_managers(&mut self, pkgs: &[Package]) {
        for pkg in pkgs {
            if !pkg.pmi.is_empty() {
                tracing::debug!("registered custom manager: {}", pkg.name);
                self.custom.insert(pkg.name.clone(), pkg.clone());
            }
        }
    }

    /// Resolve the platform-specific package name: first `map` hit in
    /// lookup-key order, then `def`, then `name`.
    #[must_use]
    pub fn resolve_name(&self, pkg: &Package) -> String {
        for key in registry::lookup_keys(&self.sys.distro, &self.sys.base_pm) {
            if let Some(mapped) = pkg.map.get(&key) {
                return mapped.clone();
            }
        }
        if !pkg.def.is_empty() {
            return pkg.def.clone();
        }
        pkg.name.clone()
    }

    /// The manager under which this package may join a batch, if any.
    ///
    /// A package batches only when it has no lifecycle hooks and its
    /// effective manager (or the base manager when unset) has a batch
    /// template.
    #[must_use]
    pub fn batch_manager(&self, pkg: &Package) -> Option<String> {
        if pkg.has_custom_hooks() {
            return None;
        }
        let mgr = pkg.effective_manager();
        let candidate = if mgr.is_empty() || mgr == self.sys.base_pm {
            self.sys.base_pm.as_str()
        } else {
            mgr
        };
        registry::batch_install_template(candidate).map(|_| candidate.to_string())
    }

    /// Whether [`batch_manager`](Self::batch_manager) yields a manager.
    #[must_use]
    pub fn is_batchable(&self, pkg: &Package) -> bool {
        self.batch_manager(pkg).is_some()
    }

    /// Run the manager's metadata refresh at most once per process.
    /// Failure is logged, not fatal.
    pub fn ensure_updated(&self, pm: &str) {
        {
            let mut updated = self
                .updated
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !updated.insert(pm.to_string()) {
                return;
            }
        }

        let cmd = self.build_system_update_cmd(pm);
        if cmd.is_empty() {
            return;
        }

        tracing::info!("updating package metadata for {pm}");
        let lock = self.lock_for(pm);
        let _guard = lock.as_ref().map(|m| lock_mutex(m));
        if let Err(e) = self.runner.exec_stream(&cmd, pm) {
            tracing::warn!("metadata update for {pm} failed: {e}");
        }
    }

    /// Install a set of names through one manager in a single command.
    ///
    /// Names whose native check already passes are filtered out first;
    /// when nothing is left the whole batch is a skip.
    ///
    /// # Errors
    ///
    /// Returns [`SkipSignal`] when every name is already installed, or the
    /// install command's error.
    pub fn install_batch(&self, pm: &str, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        let to_install: Vec<String> = names
            .iter()
            .filter(|name| {
                let check = self.build_check_cmd(pm, name);
                if !check.is_empty() && self.runner.exec_silent(&check) == 0 {
                    tracing::debug!("[{pm}] '{name}' already installed");
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();

        if to_install.is_empty() {
            tracing::info!("[{pm}] every batch item already installed");
            return Err(SkipSignal::because("all packages already installed"));
        }

        self.ensure_updated(pm);

        let lock = self.lock_for(pm);
        let _guard = lock.as_ref().map(|m| lock_mutex(m));

        tracing::info!("[{pm}] batch installing: {}", to_install.join(" "));
        let cmd = self.build_batch_install_cmd(pm, &to_install);
        self.runner.exec_stream(&cmd, &format!("{pm}-batch"))
    }

    /// Install one package, walking its candidate managers in order.
    ///
    /// # Errors
    ///
    /// Returns [`SkipSignal`] when a check showed the package present, a
    /// hook failure, or the last manager's error once all candidates fail
    /// (unless `ignore` is set, which downgrades that to a warning).
    pub fn install_one(&self, pkg: &Package) -> Result<()> {
        let mut manager_str = pkg.effective_manager().to_string();
        if manager_str.is_empty() {
            if !pkg.exec.is_empty() {
                manager_str = "non-pm".to_string();
            } else if !self.sys.base_pm.is_empty() && self.sys.base_pm != "unknown" {
                manager_str.clone_from(&self.sys.base_pm);
            } else {
                bail!(
                    "no manager specified for package '{}' and no base manager detected",
                    pkg.name
                );
            }
        }

        let data = TemplateData::new()
            .vars(&self.vars)
            .name(&pkg.name)
            .os(&self.sys.os);

        if !pkg.pre.is_empty() {
            tracing::debug!("running pre-hook for {}", pkg.name);
            self.runner.exec_stream(&render(&pkg.pre, &data), &pkg.name)?;
        }

        let mut last_err: Option<anyhow::Error> = None;
        let mut installed = false;
        let mut already_installed = false;

        for pm in manager_str.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            match self.try_install_core(pkg, pm) {
                Ok(CoreOutcome::AlreadyInstalled) => {
                    already_installed = true;
                    break;
                }
                Ok(CoreOutcome::Installed) => {
                    installed = true;
                    break;
                }
                Err(e) => {
                    tracing::debug!("manager '{pm}' failed for '{}': {e:#}", pkg.name);
                    last_err = Some(e);
                }
            }
        }

        if already_installed {
            return Err(SkipSignal::because("already installed"));
        }

        if !installed {
            if pkg.ignore {
                tracing::warn!("failed to install '{}', ignoring (ignore=true)", pkg.name);
                return Ok(());
            }
            return Err(last_err
                .unwrap_or_else(|| anyhow!("installation failed or no valid package manager found")));
        }

        if !pkg.post.is_empty() {
            tracing::debug!("running post-hook for {}", pkg.name);
            self.runner.exec_stream(&render(&pkg.post, &data), &pkg.name)?;
        }

        Ok(())
    }

    /// One install attempt through one manager: check, refresh, lock, run.
    fn try_install_core(&self, pkg: &Package, pm: &str) -> Result<CoreOutcome> {
        // `apt` is the interactive face of `apt-get`; normalize when the
        // base manager is apt-get so templates and locks line up.
        let real_pm = if pm == "apt" && self.sys.base_pm == "apt-get" {
            "apt-get"
        } else {
            pm
        };
        let target_pm = if real_pm.is_empty() {
            self.sys.base_pm.as_str()
        } else {
            real_pm
        };

        let name_for_pm = self.resolve_name(pkg);
        let native_check = self.build_check_cmd(target_pm, &name_for_pm);

        let installed = if pkg.check.is_empty() {
            !native_check.is_empty() && self.runner.exec_silent(&native_check) == 0
        } else {
            let super_check = if native_check.is_empty() {
                "false".to_string()
            } else {
                native_check.clone()
            };
            let data = TemplateData::new()
                .vars(&self.vars)
                .name(&pkg.name)
                .os(&self.sys.os)
                .super_check(&super_check);
            self.runner.exec_silent(&render(&pkg.check, &data)) == 0
        };

        if installed {
            return Ok(CoreOutcome::AlreadyInstalled);
        }

        let display_pm = if target_pm.is_empty() { "system" } else { target_pm };
        tracing::info!("installing {} via {display_pm}", pkg.name);

        if pm != "none" {
            self.ensure_updated(target_pm);
        }
        let lock = (pm != "none").then(|| self.lock_for(real_pm)).flatten();
        let _guard = lock.as_ref().map(|m| lock_mutex(m));

        let data = TemplateData::new()
            .vars(&self.vars)
            .name(&pkg.name)
            .os(&self.sys.os);

        let install_cmd = if !pkg.exec.is_empty() {
            render(&pkg.exec, &data)
        } else if let Some(custom) = self.custom.get(real_pm) {
            render(&custom.pmi, &data)
        } else if let Some(templates) = registry::language_templates(real_pm) {
            render(templates.install, &data)
        } else if real_pm.is_empty() || real_pm == self.sys.base_pm {
            self.build_install_cmd(&self.sys.base_pm, &name_for_pm)
        } else {
            bail!("unknown package manager: {real_pm}");
        };

        self.runner.exec_stream(&install_cmd, &pkg.name)?;
        Ok(CoreOutcome::Installed)
    }

    // -- template resolution ------------------------------------------------

    /// Check template precedence: custom `pmc` → language triple → base map.
    fn resolve_check_tpl(&self, pm: &str) -> Option<String> {
        if let Some(custom) = self.custom.get(pm) {
            if !custom.pmc.is_empty() {
                return Some(custom.pmc.clone());
            }
        }
        if let Some(templates) = registry::language_templates(pm) {
            return Some(templates.check.to_string());
        }
        registry::base_check_template(pm).map(ToString::to_string)
    }

    /// Single-install template precedence: custom `pmi` → language triple
    /// → base map.
    fn resolve_install_tpl(&self, pm: &str) -> Option<String> {
        if let Some(custom) = self.custom.get(pm) {
            if !custom.pmi.is_empty() {
                return Some(custom.pmi.clone());
            }
        }
        if let Some(templates) = registry::language_templates(pm) {
            return Some(templates.install.to_string());
        }
        registry::single_install_template(pm).map(ToString::to_string)
    }

    /// Update command precedence: custom `upd`, then the custom manager's
    /// `pmu` template, then the system update map.
    fn resolve_update_cmd(&self, pm: &str) -> Option<String> {
        if let Some(custom) = self.custom.get(pm) {
            if !custom.upd.is_empty() {
                return Some(custom.upd.clone());
            }
            if !custom.pmu.is_empty() {
                return Some(custom.pmu.clone());
            }
        }
        registry::system_update_cmd(pm).map(ToString::to_string)
    }

    // -- command builders ---------------------------------------------------

    /// Conjunction of the check template rendered for every whitespace
    /// token of `raw_name`. Empty when the manager has no check template.
    #[must_use]
    pub fn build_check_cmd(&self, pm: &str, raw_name: &str) -> String {
        let Some(tpl) = self.resolve_check_tpl(pm) else {
            return String::new();
        };
        let names: Vec<&str> = raw_name.split_whitespace().collect();
        if names.is_empty() {
            return "false".to_string();
        }
        names
            .iter()
            .map(|name| {
                let data = TemplateData::new().vars(&self.vars).name(name);
                render(&tpl, &data)
            })
            .collect::<Vec<_>>()
            .join(" && ")
    }

    fn build_install_cmd(&self, pm: &str, name: &str) -> String {
        let data = TemplateData::new().vars(&self.vars).name(name);
        let cmd = match self.resolve_install_tpl(pm) {
            Some(tpl) => render(&tpl, &data),
            None => format!("{pm} install {name}"),
        };
        self.apply_sudo(pm, cmd)
    }

    fn build_batch_install_cmd(&self, pm: &str, names: &[String]) -> String {
        let tpl = registry::batch_install_template(pm)
            .map_or_else(|| format!("{pm} install {{{{ names }}}}"), ToString::to_string);
        let joined = names.join(" ");
        let data = TemplateData::new().vars(&self.vars).names(&joined);
        self.apply_sudo(pm, render(&tpl, &data))
    }

    fn build_system_update_cmd(&self, pm: &str) -> String {
        let Some(tpl) = self.resolve_update_cmd(pm) else {
            return String::new();
        };
        let data = TemplateData::new().vars(&self.vars);
        self.apply_sudo(pm, render(&tpl, &data))
    }

    /// Prepend `sudo` when the manager needs root, the process is not
    /// root, and the command does not already start with it.
    fn apply_sudo(&self, pm: &str, cmd: String) -> String {
        if registry::needs_sudo(pm) && !self.is_root && !cmd.trim_start().starts_with("sudo") {
            format!("sudo {cmd}")
        } else {
            cmd
        }
    }

    /// Mutex for the manager's lock group, created on first use.
    fn lock_for(&self, pm: &str) -> Option<Arc<Mutex<()>>> {
        let group = registry::lock_group(pm)?;
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(locks.entry(group.to_string()).or_default()))
    }
}

fn lock_mutex(m: &Mutex<()>) -> MutexGuard<'_, ()> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
