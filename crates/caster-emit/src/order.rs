//! Dependency ordering
//!
//! Kahn's algorithm over node indices with a sorted ready set. Ties are
//! always broken by the smallest index, so the order is a pure function of
//! the dependency graph.

use std::collections::BTreeSet;
use thiserror::Error;

/// Dependency cycle among the given nodes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle among nodes {remaining:?}")]
pub struct CycleError {
    /// Nodes that could not be ordered, ascending
    pub remaining: Vec<usize>,
}

/// Order `n` nodes so that every node follows its prerequisites.
///
/// `prerequisites(i)` lists the nodes `i` depends on. Out-of-range and
/// self references are ignored.
///
/// # Errors
///
/// Returns [`CycleError`] when fewer than `n` nodes can be emitted.
pub fn topo_sort<F>(n: usize, prerequisites: F) -> Result<Vec<usize>, CycleError>
where
    F: Fn(usize) -> Vec<usize>,
{
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for node in 0..n {
        let mut seen = BTreeSet::new();
        for dep in prerequisites(node) {
            if dep >= n || dep == node || !seen.insert(dep) {
                continue;
            }
            in_degree[node] += 1;
            dependents[dep].push(node);
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < n {
        let emitted: BTreeSet<usize> = order.iter().copied().collect();
        return Err(CycleError {
            remaining: (0..n).filter(|i| !emitted.contains(i)).collect(),
        });
    }
    Ok(order)
}
