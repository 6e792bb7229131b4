//! Brace-delimited template rendering for user-authored command strings.
//!
//! Every template in the configuration (install commands, check commands,
//! file paths, file bodies, helper scripts) renders against the same small
//! data shape: `vars` (string map), `name`, `names`, `os`, and `super.check`
//! (the native check command for the same package). The shape is fixed on
//! purpose; users author strings against it and nothing else.
//!
//! The documented reference syntax is the dotted form: `{{.name}}`,
//! `{{.names}}`, `{{.os}}`, `{{.vars.KEY}}`, `{{.super.check}}`. Dotted
//! references are normalized to the engine's identifier form before
//! rendering, so `{{ name }}` works as well.
//!
//! Render failures are non-fatal: the input string is returned verbatim and
//! a debug line is logged. Templates live in user YAML, so a hard failure
//! here would be brittle; a malformed command surfaces a meaningful error
//! from the shell instead.

use std::collections::BTreeMap;

use tera::Tera;

/// Data map handed to [`render`]. Unset fields are omitted from the
/// template context entirely.
#[derive(Debug, Default, Clone)]
pub struct TemplateData<'a> {
    vars: Option<&'a BTreeMap<String, String>>,
    name: Option<&'a str>,
    names: Option<&'a str>,
    os: Option<&'a str>,
    super_check: Option<&'a str>,
}

impl<'a> TemplateData<'a> {
    /// Start an empty data map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the variable map as `{{.vars.KEY}}`.
    #[must_use]
    pub fn vars(mut self, vars: &'a BTreeMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Expose a package or task name as `{{.name}}`.
    #[must_use]
    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Expose a space-joined name list as `{{.names}}`.
    #[must_use]
    pub fn names(mut self, names: &'a str) -> Self {
        self.names = Some(names);
        self
    }

    /// Expose the detected operating system as `{{.os}}`.
    #[must_use]
    pub fn os(mut self, os: &'a str) -> Self {
        self.os = Some(os);
        self
    }

    /// Expose the native check command as `{{.super.check}}`.
    #[must_use]
    pub fn super_check(mut self, check: &'a str) -> Self {
        self.super_check = Some(check);
        self
    }

    fn to_context(&self) -> tera::Context {
        let mut ctx = tera::Context::new();
        if let Some(vars) = self.vars {
            ctx.insert("vars", vars);
        }
        if let Some(name) = self.name {
            ctx.insert("name", name);
        }
        if let Some(names) = self.names {
            ctx.insert("names", names);
        }
        if let Some(os) = self.os {
            ctx.insert("os", os);
        }
        if let Some(check) = self.super_check {
            let mut sup = BTreeMap::new();
            sup.insert("check", check);
            ctx.insert("super", &sup);
        }
        ctx
    }
}

/// Render `tpl` against `data`, returning the input unchanged on any parse
/// or execution failure. Strings without `{{` pass through untouched.
#[must_use]
pub fn render(tpl: &str, data: &TemplateData<'_>) -> String {
    if !tpl.contains("{{") && !tpl.contains("{%") {
        return tpl.to_string();
    }
    let normalized = normalize_refs(tpl);
    match Tera::one_off(&normalized, &data.to_context(), false) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::debug!("template render failed, using raw string: {e} (template: {tpl})");
            tpl.to_string()
        }
    }
}

/// Rewrite dotted references (`{{.vars.home}}`) into identifier form
/// (`{{ vars.home }}`).
///
/// Only expressions that are a single plain dotted path are rewritten;
/// everything else is passed to the parser untouched. Unterminated tags
/// are left as-is so the render fallback still sees the original text.
fn normalize_refs(tpl: &str) -> String {
    let mut out = String::with_capacity(tpl.len());
    let mut rest = tpl;
    while let Some(start) = rest.find("{{") {
        let (before, tag) = rest.split_at(start);
        out.push_str(before);
        let Some(end) = tag[2..].find("}}") else {
            out.push_str(tag);
            return out;
        };
        let inner = &tag[2..2 + end];
        if let Some(path) = dotted_path(inner.trim()) {
            out.push_str("{{ ");
            out.push_str(path);
            out.push_str(" }}");
        } else {
            out.push_str(&tag[..end + 4]);
        }
        rest = &tag[end + 4..];
    }
    out.push_str(rest);
    out
}

/// `.vars.home` → `vars.home` when the expression is nothing but a dotted
/// path of plain segments.
fn dotted_path(expr: &str) -> Option<&str> {
    let path = expr.strip_prefix('.')?;
    let plain_segments = path.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    if path.is_empty() || !plain_segments {
        return None;
    }
    Some(path)
}
