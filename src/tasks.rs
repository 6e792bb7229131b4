//! Task node logic: optional check gate, `on` actions, then the run command.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::config::{self, Task};
use crate::error::SkipSignal;
use crate::exec::Runner;
use crate::template::{render, TemplateData};

/// Execute one task.
///
/// Task-local `vars` shadow the globals for the duration of this task
/// only. When `check` is set, its exit decides between the `on.success`
/// and `on.fail` actions (defaults: success → skip, fail → run). A
/// rendered check starting with `exists:` tests path existence directly
/// instead of spawning a shell.
///
/// # Errors
///
/// Returns [`SkipSignal`] when the check resolves to the skip action, or
/// the run command's error.
pub fn run_task(task: &Task, runner: &dyn Runner, global_vars: &BTreeMap<String, String>) -> Result<()> {
    let mut vars = global_vars.clone();
    vars.extend(task.vars.clone());
    config::resolve_vars(&mut vars);

    let data = TemplateData::new().vars(&vars).name(&task.id);

    if !task.check.is_empty() {
        let rendered = render(&task.check, &data);
        let passed = if let Some(path) = rendered.strip_prefix("exists:") {
            path_exists(path.trim())
        } else {
            runner.exec_silent(&rendered) == 0
        };

        let (key, default_action) = if passed { ("success", "skip") } else { ("fail", "run") };
        let action = task.on.get(key).map_or(default_action, String::as_str);
        if action == "skip" {
            tracing::info!("[{}] check resolved to skip", task.id);
            return Err(SkipSignal::because("check resolved to skip"));
        }
    }

    tracing::info!("running task: [{}]", task.id);
    runner.exec_stream(&render(&task.run, &data), &task.id)
}

fn path_exists(raw: &str) -> bool {
    let expanded = shellexpand::full(raw)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string());
    Path::new(&expanded).exists()
}
