//! Declarative host provisioning engine.
//!
//! One YAML document describes the desired machine state: dotfiles to
//! link or render, packages across one or more managers, and arbitrary
//! shell tasks with inter-item dependencies. The engine orders the work
//! into a dependency graph, coalesces compatible package installs into
//! batched manager invocations, executes each graph layer concurrently
//! under per-manager locks, and reports a per-node outcome table.
//!
//! The crate is organised bottom-up:
//!
//! - **[`template`] / [`exec`]** — command rendering and shell execution
//! - **[`config`]** — the YAML schema, include merging, variables
//! - **[`pm`]** — the manager registry and install engine
//! - **[`files`] / [`tasks`]** — the non-package node behaviors
//! - **[`nodes`] / [`dag`] / [`scheduler`]** — the execution core

pub mod cli;
pub mod config;
pub mod dag;
pub mod error;
pub mod exec;
pub mod files;
pub mod logging;
pub mod nodes;
pub mod platform;
pub mod pm;
pub mod privileges;
pub mod scheduler;
pub mod scripts;
pub mod tasks;
pub mod template;
