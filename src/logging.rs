//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Debug-level output is enabled by the `--debug` flag or by setting
//! `DOTBUILDER_DEBUG` to `1`, `true`, or `yes`. Logs go to stderr so that
//! stdout carries streamed task output and the final summary table.

use tracing_subscriber::fmt;

/// Initialise the global subscriber. Safe to call once at startup.
pub fn init(debug_flag: bool) {
    let level = if debug_flag || debug_env(std::env::var("DOTBUILDER_DEBUG").ok().as_deref()) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Whether a `DOTBUILDER_DEBUG` value turns debug logging on.
fn debug_env(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_env_accepts_truthy_values() {
        assert!(debug_env(Some("1")));
        assert!(debug_env(Some("true")));
        assert!(debug_env(Some("YES")));
    }

    #[test]
    fn debug_env_rejects_other_values() {
        assert!(!debug_env(None));
        assert!(!debug_env(Some("")));
        assert!(!debug_env(Some("0")));
        assert!(!debug_env(Some("no")));
        assert!(!debug_env(Some("verbose")));
    }
}
