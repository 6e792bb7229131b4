//! YAML configuration: schema, recursive include merging, and variable
//! resolution.
//!
//! A configuration document declares metadata, variables, helper scripts,
//! and the three node kinds (packages, files, tasks). Included documents
//! are merged depth-first: lists append, `vars`/`scripts` merge key-wise
//! with later documents winning, and non-empty scalar metadata overwrites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::platform::SystemInfo;
use crate::template::{render, TemplateData};

/// Upper bound on variable-expansion passes; expansion normally reaches a
/// fixed point long before this.
const MAX_RESOLVE_PASSES: usize = 100;

/// Build target metadata.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: String,
    pub ver: String,
}

/// Top-level configuration document.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths of documents to merge in, relative to this document.
    pub include: Vec<String>,
    pub meta: Meta,
    pub vars: BTreeMap<String, String>,
    /// Helper scripts staged onto PATH before the run (name → body).
    pub scripts: BTreeMap<String, String>,
    #[serde(deserialize_with = "de_packages")]
    pub pkgs: Vec<Package>,
    pub files: Vec<File>,
    pub tasks: Vec<Task>,
}

/// A package to install, possibly through several candidate managers.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Package {
    pub name: String,
    /// Default resolved package name when `map` has no match.
    pub def: String,
    /// Per-distro / per-manager name overrides (lookup key → name).
    pub map: BTreeMap<String, String>,
    /// `;`-separated ordered manager candidates.
    pub manager: String,
    /// Alias for `manager`; wins when both are set.
    pub pm: String,
    /// Turn a final install failure into a logged warning.
    pub ignore: bool,
    pub deps: Vec<String>,

    // Install lifecycle hooks.
    pub check: String,
    pub pre: String,
    /// Custom install command replacing any manager template.
    pub exec: String,
    pub post: String,

    // Manager templates: a package with a non-empty `pmi` doubles as a
    // custom manager other packages can name in their `manager` field.
    pub pmi: String,
    pub pmc: String,
    pub pmu: String,

    // Maintenance commands.
    pub upd: String,
    pub clean: String,
}

impl Package {
    /// The declared manager string, preferring the `pm` alias.
    #[must_use]
    pub fn effective_manager(&self) -> &str {
        if self.pm.is_empty() {
            &self.manager
        } else {
            &self.pm
        }
    }

    /// Whether any lifecycle hook is set, which disqualifies the package
    /// from batching.
    #[must_use]
    pub fn has_custom_hooks(&self) -> bool {
        !self.check.is_empty()
            || !self.pre.is_empty()
            || !self.exec.is_empty()
            || !self.post.is_empty()
    }
}

/// A dotfile to link, render, or append into place.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct File {
    pub id: String,
    pub src: String,
    pub dest: String,
    /// Replace an existing destination. Mutually exclusive with `append`.
    #[serde(rename = "override")]
    pub overwrite: bool,
    /// Guard command; overwriting proceeds only if it exits 0.
    pub override_if: String,
    /// Append the source content instead of linking/writing.
    pub append: bool,
    /// Render the source through the template engine and write the result
    /// instead of symlinking.
    pub tpl: bool,
    pub check: String,
    pub deps: Vec<String>,
}

impl File {
    /// Node id: the explicit `id`, or the raw destination path.
    #[must_use]
    pub fn node_id(&self) -> String {
        if self.id.is_empty() {
            self.dest.clone()
        } else {
            self.id.clone()
        }
    }
}

/// An arbitrary shell task with an optional check gate.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub deps: Vec<String>,
    /// Task-local variables shadowing globals during this task only.
    pub vars: BTreeMap<String, String>,
    pub check: String,
    /// Action per check outcome: keys `success` / `fail`, values
    /// `skip` / `run`.
    pub on: BTreeMap<String, String>,
    pub run: String,
}

/// A package entry is either a bare name or a full mapping.
fn de_packages<'de, D>(deserializer: D) -> Result<Vec<Package>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Shorthand(String),
        Full(Package),
    }

    let entries = Vec::<Entry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Shorthand(name) => Package {
                def: name.clone(),
                name,
                ..Package::default()
            },
            Entry::Full(pkg) => pkg,
        })
        .collect())
}

impl Config {
    /// Load a configuration document, recursively merging its includes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unreadable files, YAML that does not
    /// match the schema, or an include chain that loops.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut stack = Vec::new();
        load_recursive(path, &mut stack)
    }

    /// Merge `other` into `self`: later documents win for scalars and map
    /// keys; lists append.
    fn merge(&mut self, other: Config) {
        if !other.meta.name.is_empty() {
            self.meta.name = other.meta.name;
        }
        if !other.meta.ver.is_empty() {
            self.meta.ver = other.meta.ver;
        }
        self.vars.extend(other.vars);
        self.scripts.extend(other.scripts);
        self.pkgs.extend(other.pkgs);
        self.files.extend(other.files);
        self.tasks.extend(other.tasks);
    }
}

fn load_recursive(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Config, ConfigError> {
    let canonical = path.canonicalize().map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    if stack.contains(&canonical) {
        return Err(ConfigError::CyclicInclude(path.display().to_string()));
    }
    stack.push(canonical);

    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let parsed: Config = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut merged = Config::default();
    for include in &parsed.include {
        let child = load_recursive(&base_dir.join(include), stack)?;
        merged.merge(child);
    }
    merged.merge(parsed);

    stack.pop();
    Ok(merged)
}

/// Inject the well-known variables: `OS` and `DISTRO` always, `home` and
/// `user` only when the document did not set them.
pub fn seed_vars(vars: &mut BTreeMap<String, String>, sys: &SystemInfo) {
    vars.insert("OS".to_string(), sys.os.clone());
    vars.insert("DISTRO".to_string(), sys.distro.clone());
    if !vars.contains_key("home") {
        if let Some(home) = dirs::home_dir() {
            vars.insert("home".to_string(), home.display().to_string());
        }
    }
    if !vars.contains_key("user") {
        if let Ok(user) = std::env::var("USER") {
            vars.insert("user".to_string(), user);
        }
    }
}

/// Expand variables that reference other variables until a fixed point is
/// reached (bounded at [`MAX_RESOLVE_PASSES`] passes).
pub fn resolve_vars(vars: &mut BTreeMap<String, String>) {
    for _ in 0..MAX_RESOLVE_PASSES {
        let snapshot = vars.clone();
        let data = TemplateData::new().vars(&snapshot);
        let mut changed = false;
        for value in vars.values_mut() {
            if !value.contains("{{") {
                continue;
            }
            let rendered = render(value, &data);
            if rendered != *value {
                *value = rendered;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).expect("valid config yaml")
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    #[test]
    fn parses_scalar_and_mapping_packages() {
        let cfg = parse("pkgs:\n  - git\n  - name: ripgrep\n    pm: cargo\n");
        assert_eq!(cfg.pkgs.len(), 2);
        assert_eq!(cfg.pkgs[0].name, "git");
        assert_eq!(cfg.pkgs[0].def, "git");
        assert_eq!(cfg.pkgs[1].name, "ripgrep");
        assert_eq!(cfg.pkgs[1].effective_manager(), "cargo");
    }

    #[test]
    fn pm_alias_wins_over_manager() {
        let cfg = parse("pkgs:\n  - name: jq\n    manager: apt-get\n    pm: brew\n");
        assert_eq!(cfg.pkgs[0].effective_manager(), "brew");
    }

    #[test]
    fn custom_hooks_detected() {
        let cfg = parse("pkgs:\n  - name: a\n  - name: b\n    check: which b\n");
        assert!(!cfg.pkgs[0].has_custom_hooks());
        assert!(cfg.pkgs[1].has_custom_hooks());
    }

    #[test]
    fn parses_file_override_and_append() {
        let cfg = parse(
            "files:\n  - src: bashrc\n    dest: ~/.bashrc\n    override: true\n  - src: s.sh\n    dest: ~/.profile\n    append: true\n",
        );
        assert!(cfg.files[0].overwrite);
        assert!(!cfg.files[0].append);
        assert!(cfg.files[1].append);
    }

    #[test]
    fn file_node_id_falls_back_to_dest() {
        let cfg = parse("files:\n  - id: rc\n    src: a\n    dest: ~/.a\n  - src: b\n    dest: ~/.b\n");
        assert_eq!(cfg.files[0].node_id(), "rc");
        assert_eq!(cfg.files[1].node_id(), "~/.b");
    }

    #[test]
    fn parses_task_with_on_mapping() {
        let cfg = parse(
            "tasks:\n  - id: hostname\n    check: test -f /etc/hostname\n    on:\n      success: skip\n      fail: run\n    run: echo hi\n",
        );
        let task = &cfg.tasks[0];
        assert_eq!(task.on.get("success").map(String::as_str), Some("skip"));
        assert_eq!(task.on.get("fail").map(String::as_str), Some("run"));
    }

    #[test]
    fn empty_document_parses_to_defaults() {
        let cfg = parse("{}");
        assert!(cfg.pkgs.is_empty());
        assert!(cfg.files.is_empty());
        assert!(cfg.tasks.is_empty());
        assert!(cfg.meta.name.is_empty());
    }

    // -----------------------------------------------------------------------
    // Includes
    // -----------------------------------------------------------------------

    #[test]
    fn load_merges_includes_with_later_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.yaml"),
            "meta: {name: base, ver: \"1\"}\nvars: {editor: vi, shell: sh}\npkgs: [git]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("main.yaml"),
            "include: [base.yaml]\nmeta: {name: laptop}\nvars: {editor: nvim}\npkgs: [curl]\n",
        )
        .unwrap();

        let cfg = Config::load(&dir.path().join("main.yaml")).unwrap();
        assert_eq!(cfg.meta.name, "laptop");
        assert_eq!(cfg.meta.ver, "1", "empty scalar must not overwrite");
        assert_eq!(cfg.vars.get("editor").map(String::as_str), Some("nvim"));
        assert_eq!(cfg.vars.get("shell").map(String::as_str), Some("sh"));
        let names: Vec<&str> = cfg.pkgs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["git", "curl"], "lists append, includes first");
    }

    #[test]
    fn load_rejects_cyclic_includes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "include: [b.yaml]\n").unwrap();
        std::fs::write(dir.path().join("b.yaml"), "include: [a.yaml]\n").unwrap();

        let err = Config::load(&dir.path().join("a.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::CyclicInclude(_)), "got: {err}");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/construct.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "pkgs: {not: a list}\n").unwrap();
        let err = Config::load(&dir.path().join("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    #[test]
    fn seed_vars_injects_os_and_distro() {
        let sys = SystemInfo::new("linux", "debian", "apt-get");
        let mut vars = BTreeMap::new();
        seed_vars(&mut vars, &sys);
        assert_eq!(vars.get("OS").map(String::as_str), Some("linux"));
        assert_eq!(vars.get("DISTRO").map(String::as_str), Some("debian"));
    }

    #[test]
    fn seed_vars_keeps_explicit_home() {
        let sys = SystemInfo::new("linux", "debian", "apt-get");
        let mut vars = BTreeMap::new();
        vars.insert("home".to_string(), "/custom".to_string());
        seed_vars(&mut vars, &sys);
        assert_eq!(vars.get("home").map(String::as_str), Some("/custom"));
    }

    #[test]
    fn resolve_vars_reaches_fixed_point() {
        let mut vars = BTreeMap::new();
        vars.insert("root".to_string(), "/opt".to_string());
        vars.insert("bin".to_string(), "{{ vars.root }}/bin".to_string());
        vars.insert("tool".to_string(), "{{ vars.bin }}/tool".to_string());
        resolve_vars(&mut vars);
        assert_eq!(vars.get("tool").map(String::as_str), Some("/opt/bin/tool"));
    }

    #[test]
    fn resolve_vars_accepts_dotted_references() {
        let mut vars = BTreeMap::new();
        vars.insert("home".to_string(), "/home/u".to_string());
        vars.insert("dotdir".to_string(), "{{.vars.home}}/dotfiles".to_string());
        resolve_vars(&mut vars);
        assert_eq!(
            vars.get("dotdir").map(String::as_str),
            Some("/home/u/dotfiles")
        );
    }

    #[test]
    fn resolve_vars_leaves_unresolvable_references() {
        let mut vars = BTreeMap::new();
        vars.insert("x".to_string(), "{{ vars.missing }}".to_string());
        resolve_vars(&mut vars);
        assert_eq!(vars.get("x").map(String::as_str), Some("{{ vars.missing }}"));
    }
}
