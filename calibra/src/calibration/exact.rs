use std::collections::VecDeque;

use tracing::debug;

use super::{Budget, CalibrationState, Directed, Run};
use crate::cluster_graph::{ClusterGraph, ClusterId};
use crate::factor::Potential;
use crate::{CalibraError, Result};

/// Breadth-first tree of the component of `root`, as two message lists: the collect pass
/// (every cluster sends to its parent after having heard from all its children) and the
/// distribute pass (parents to children, root first).
///
/// `visited` and `tree_edges` are updated with the clusters and edges reached.
pub(super) fn tree_schedule<P: Potential>(
    graph: &ClusterGraph<P>,
    root: ClusterId,
    visited: &mut [bool],
    tree_edges: &mut [bool],
) -> Result<(Vec<Directed>, Vec<Directed>)> {
    let mut distribute = Vec::new();
    let mut queue = VecDeque::from([root]);
    visited[root] = true;
    while let Some(cluster) = queue.pop_front() {
        for (edge, neighbor) in graph.neighbors(cluster)? {
            if !visited[neighbor] {
                visited[neighbor] = true;
                tree_edges[edge] = true;
                distribute.push(Directed {
                    edge,
                    from: cluster,
                    to: neighbor,
                });
                queue.push_back(neighbor);
            }
        }
    }
    let collect = distribute.iter().rev().map(|d| d.reversed()).collect();
    Ok((collect, distribute))
}

/// Two-pass propagation; exact on trees.
pub(super) fn calibrate<P: Potential>(
    graph: &ClusterGraph<P>,
    state: &mut CalibrationState<P>,
    root: ClusterId,
    budget: &mut Budget,
) -> Result<Run> {
    if graph.num_clusters() == 0 {
        return Ok(Run {
            converged: true,
            passes: 0,
        });
    }
    if !graph.is_tree() {
        return Err(CalibraError::NotTree);
    }
    graph.cluster(root)?;
    let mut visited = vec![false; graph.num_clusters()];
    let mut tree_edges = vec![false; graph.num_edges()];
    let (collect, distribute) = tree_schedule(graph, root, &mut visited, &mut tree_edges)?;
    debug!(root, messages = collect.len() + distribute.len(), "two-pass schedule");
    for d in collect.into_iter().chain(distribute) {
        if !budget.take() {
            return Ok(Run {
                converged: false,
                passes: 0,
            });
        }
        state.send(graph, d)?;
    }
    Ok(Run {
        converged: true,
        passes: 0,
    })
}
