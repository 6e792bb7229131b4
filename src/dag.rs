//! Dependency graph with linear and layered topological ordering.
//!
//! Adjacency is stored child → parents, mirroring how dependencies are
//! declared (`deps: [a, b]` on the child). The linear sort is a recursive
//! DFS used for cycle diagnostics; the layered sort is Kahn's algorithm
//! whose level sets become the scheduler's concurrency frontiers.

use std::collections::HashMap;

use crate::error::ConfigError;

/// String-keyed dependency graph.
#[derive(Debug, Default)]
pub struct Graph {
    /// Parents (dependencies) of each child node.
    parents: HashMap<String, Vec<String>>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `child` depends on `dep`.
    pub fn add_edge(&mut self, dep: &str, child: &str) {
        self.parents
            .entry(child.to_string())
            .or_default()
            .push(dep.to_string());
    }

    /// Dependencies of `id` known to the graph.
    #[must_use]
    pub fn parents_of(&self, id: &str) -> &[String] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Linear topological order of `items` (dependencies first).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cycle`] when a back-edge is found.
    pub fn sort(&self, items: &[String]) -> Result<Vec<String>, ConfigError> {
        let mut visited: HashMap<&str, bool> = HashMap::new(); // true = done, false = on stack
        let mut result = Vec::with_capacity(items.len());

        fn visit<'a>(
            graph: &'a Graph,
            node: &'a str,
            visited: &mut HashMap<&'a str, bool>,
            result: &mut Vec<String>,
        ) -> Result<(), ConfigError> {
            match visited.get(node) {
                Some(true) => return Ok(()),
                Some(false) => return Err(ConfigError::Cycle(vec![node.to_string()])),
                None => {}
            }
            visited.insert(node, false);
            for dep in graph.parents_of(node) {
                visit(graph, dep, visited, result)?;
            }
            visited.insert(node, true);
            result.push(node.to_string());
            Ok(())
        }

        for item in items {
            visit(self, item, &mut visited, &mut result)?;
        }
        Ok(result)
    }

    /// Layered topological order of `items` via Kahn's algorithm.
    ///
    /// Each layer holds the nodes whose dependencies are all in earlier
    /// layers; within a layer nodes are sorted lexicographically so the
    /// ordering is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cycle`] naming every node left undrained.
    pub fn sort_layers(&self, items: &[String]) -> Result<Vec<Vec<String>>, ConfigError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();

        for id in items {
            let parents = self.parents_of(id);
            in_degree.insert(id, parents.len());
            for parent in parents {
                children.entry(parent).or_default().push(id);
            }
        }

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter_map(|(id, &d)| (d == 0).then_some(*id))
            .collect();
        queue.sort_unstable();

        let mut layers = Vec::new();
        let mut processed = 0usize;

        while !queue.is_empty() {
            processed += queue.len();
            let mut next = Vec::new();
            for id in &queue {
                for child in children.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                    if let Some(d) = in_degree.get_mut(child) {
                        *d -= 1;
                        if *d == 0 {
                            next.push(*child);
                        }
                    }
                }
            }
            next.sort_unstable();
            layers.push(queue.iter().map(ToString::to_string).collect());
            queue = next;
        }

        if processed != items.len() {
            let mut cycle: Vec<String> = in_degree
                .iter()
                .filter_map(|(id, &d)| (d > 0).then(|| (*id).to_string()))
                .collect();
            cycle.sort_unstable();
            return Err(ConfigError::Cycle(cycle));
        }
        Ok(layers)
    }
}
