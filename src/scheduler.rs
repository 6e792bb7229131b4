//! Layer-by-layer execution of the node graph.
//!
//! The scheduler builds the dependency graph (duplicate ids and missing
//! deps are fatal), orders it into layers, and walks the layers serially.
//! Within a layer it first blocks nodes whose dependencies did not end in
//! Success or Skipped, then partitions the rest into batch groups and
//! singletons, and runs everything on scoped OS threads. OS threads are
//! deliberate: workers block on child processes and package-manager locks,
//! which would starve a fixed-size worker pool.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;

use crate::dag::Graph;
use crate::error::{as_skip, ConfigError};
use crate::nodes::{Context, Node};

/// Terminal (or initial) state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Pending,
    Success,
    Failed,
    Skipped,
    Blocked,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Blocked => "BLOCKED",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one node, written exactly once.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub id: String,
    pub status: NodeStatus,
    pub message: Option<String>,
    pub duration: Duration,
    pub finished_at: SystemTime,
}

impl NodeResult {
    fn finished(id: &str, status: NodeStatus, message: Option<String>, duration: Duration) -> Self {
        Self {
            id: id.to_string(),
            status,
            message,
            duration,
            finished_at: SystemTime::now(),
        }
    }
}

/// Execute all nodes, returning a result per node id.
///
/// # Errors
///
/// Returns [`ConfigError`] for duplicate ids, dependencies on unknown ids,
/// or a dependency cycle. No node executes in any of those cases.
pub fn run(
    nodes: &[Box<dyn Node>],
    ctx: &Context,
) -> Result<HashMap<String, NodeResult>, ConfigError> {
    let mut node_map: HashMap<&str, &dyn Node> = HashMap::new();
    let mut ids = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node_map.insert(node.id(), node.as_ref()).is_some() {
            return Err(ConfigError::DuplicateNode(node.id().to_string()));
        }
        ids.push(node.id().to_string());
    }

    let mut graph = Graph::new();
    for node in nodes {
        for dep in node.deps() {
            if !node_map.contains_key(dep.as_str()) {
                return Err(ConfigError::MissingDependency {
                    node: node.id().to_string(),
                    dep: dep.clone(),
                });
            }
            graph.add_edge(dep, node.id());
        }
    }

    let layers = graph.sort_layers(&ids)?;
    let results: RwLock<HashMap<String, NodeResult>> = RwLock::new(HashMap::new());

    for (index, layer) in layers.iter().enumerate() {
        tracing::info!("--- layer {} ({} nodes) ---", index + 1, layer.len());

        let mut batches: HashMap<String, Vec<&dyn Node>> = HashMap::new();
        let mut singles: Vec<&dyn Node> = Vec::new();

        for id in layer {
            let Some(&node) = node_map.get(id.as_str()) else {
                continue;
            };

            if let Some(dep) = first_unsatisfied_dep(node, &results) {
                tracing::warn!("[{id}] blocked by dependency: {dep}");
                write_result(
                    &results,
                    NodeResult::finished(
                        id,
                        NodeStatus::Blocked,
                        Some(format!("dependency '{dep}' not satisfied")),
                        Duration::ZERO,
                    ),
                );
                continue;
            }

            let group = node.batch_group();
            if !group.is_empty() && node.batch_item().is_some() {
                batches.entry(group).or_default().push(node);
            } else {
                singles.push(node);
            }
        }

        std::thread::scope(|scope| {
            for (group, members) in &batches {
                let mut names: Vec<String> = Vec::new();
                let mut member_ids: Vec<String> = Vec::new();
                for node in members {
                    if let Some(item) = node.batch_item() {
                        // One package node may carry several native names.
                        names.extend(item.split_whitespace().map(ToString::to_string));
                    }
                    member_ids.push(node.id().to_string());
                }
                if names.is_empty() {
                    continue;
                }

                let results = &results;
                scope.spawn(move || {
                    let start = Instant::now();
                    let outcome = ctx.engine.install_batch(group, &names);
                    let (status, message) = classify(&outcome);
                    let duration = start.elapsed();
                    for id in &member_ids {
                        write_result(
                            results,
                            NodeResult::finished(id, status, message.clone(), duration),
                        );
                    }
                });
            }

            for &node in &singles {
                let results = &results;
                scope.spawn(move || {
                    let start = Instant::now();
                    let outcome = node.execute(ctx);
                    let (status, message) = classify(&outcome);
                    write_result(
                        results,
                        NodeResult::finished(node.id(), status, message, start.elapsed()),
                    );
                });
            }
        });
    }

    Ok(results
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner))
}

/// Map an execution outcome onto a status plus display message.
fn classify(outcome: &Result<()>) -> (NodeStatus, Option<String>) {
    match outcome {
        Ok(()) => (NodeStatus::Success, None),
        Err(e) => match as_skip(e) {
            Some(reason) => (NodeStatus::Skipped, Some(reason.to_string())),
            None => (NodeStatus::Failed, Some(format!("{e:#}"))),
        },
    }
}

fn first_unsatisfied_dep(node: &dyn Node, results: &RwLock<HashMap<String, NodeResult>>) -> Option<String> {
    let guard = results.read().unwrap_or_else(PoisonError::into_inner);
    node.deps()
        .iter()
        .find(|dep| {
            !matches!(
                guard.get(dep.as_str()).map(|r| r.status),
                Some(NodeStatus::Success | NodeStatus::Skipped)
            )
        })
        .cloned()
}

fn write_result(results: &RwLock<HashMap<String, NodeResult>>, result: NodeResult) {
    let mut guard = results.write().unwrap_or_else(PoisonError::into_inner);
    guard.insert(result.id.clone(), result);
}

/// Print the per-node outcome table in declaration order, plus an error
/// section when anything Failed or was Blocked. Returns `true` when the
/// run was clean.
pub fn print_summary(results: &HashMap<String, NodeResult>, nodes: &[Box<dyn Node>]) -> bool {
    let id_width = nodes
        .iter()
        .map(|n| n.id().len())
        .chain(std::iter::once(2))
        .max()
        .unwrap_or(2);

    println!();
    println!("{:<id_width$}   {:<8}   {:>8}   MESSAGE", "ID", "STATUS", "DURATION");
    println!("{:<id_width$}   {:<8}   {:>8}   -------", "--", "------", "--------");

    for node in nodes {
        let id = node.id();
        let Some(result) = results.get(id) else {
            println!("{id:<id_width$}   {:<8}   {:>8}   result not found", "UNKNOWN", "-");
            continue;
        };

        let color = match result.status {
            NodeStatus::Success => "\x1b[32m",
            NodeStatus::Failed => "\x1b[31m",
            NodeStatus::Blocked => "\x1b[33m",
            NodeStatus::Skipped => "\x1b[36m",
            NodeStatus::Pending => "\x1b[0m",
        };
        let duration = format!("{}ms", result.duration.as_millis());
        let message = result.message.as_deref().unwrap_or_default();
        println!(
            "{id:<id_width$}   {color}{:<8}\x1b[0m   {duration:>8}   {message}",
            result.status.to_string()
        );
    }

    let troubled: Vec<&NodeResult> = nodes
        .iter()
        .filter_map(|n| results.get(n.id()))
        .filter(|r| matches!(r.status, NodeStatus::Failed | NodeStatus::Blocked))
        .collect();

    if troubled.is_empty() {
        return true;
    }

    println!();
    println!("\x1b[31m{} node(s) did not complete:\x1b[0m", troubled.len());
    for result in troubled {
        println!(
            "  {} ({}): {}",
            result.id,
            result.status,
            result.message.as_deref().unwrap_or("no details")
        );
    }
    false
}
