use tracing::debug;

use super::exact::tree_schedule;
use super::{Budget, CalibrationState, Directed, Run};
use crate::cluster_graph::ClusterGraph;
use crate::factor::Potential;
use crate::Result;

/// Fixed schedule: collect then distribute over a breadth-first spanning forest, then both
/// directions of every edge left out of the forest. Passes repeat until one of them updates
/// no message by more than `tolerance`.
pub(super) fn calibrate<P: Potential>(
    graph: &ClusterGraph<P>,
    state: &mut CalibrationState<P>,
    tolerance: f64,
    budget: &mut Budget,
) -> Result<Run> {
    let mut visited = vec![false; graph.num_clusters()];
    let mut tree_edges = vec![false; graph.num_edges()];
    let mut collect = Vec::new();
    let mut distribute = Vec::new();
    for root in 0..graph.num_clusters() {
        if !visited[root] {
            let (c, d) = tree_schedule(graph, root, &mut visited, &mut tree_edges)?;
            collect.extend(c);
            distribute.extend(d);
        }
    }
    let mut schedule = collect;
    schedule.extend(distribute);
    for (edge, e) in graph.edges().iter().enumerate() {
        if !tree_edges[edge] {
            let (a, b) = e.clusters();
            let d = Directed {
                edge,
                from: a,
                to: b,
            };
            schedule.push(d);
            schedule.push(d.reversed());
        }
    }
    debug!(messages = schedule.len(), "round-robin schedule");
    let mut passes = 0;
    loop {
        passes += 1;
        let mut updates = 0;
        for d in schedule.iter() {
            if !budget.take() {
                return Ok(Run {
                    converged: false,
                    passes,
                });
            }
            if state.send(graph, *d)? > tolerance {
                updates += 1;
            }
        }
        debug!(passes, updates, "round-robin pass");
        if updates == 0 {
            return Ok(Run {
                converged: true,
                passes,
            });
        }
    }
}
