use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use super::{Budget, CalibrationState, Directed, Run};
use crate::cluster_graph::{ClusterGraph, EdgeId};
use crate::factor::Potential;
use crate::Result;

#[derive(Debug, Clone, Copy)]
struct Entry {
    score: f64,
    edge: EdgeId,
    // entries whose version is behind the edge's current version are stale
    version: u64,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.edge.cmp(&self.edge))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Entry {}

/// Per-edge bookkeeping of the prioritized schedule.
struct EdgeSchedule {
    // direction sent next: 0 is first -> second cluster of the edge
    next: usize,
    sent: [bool; 2],
    version: u64,
}

/// Repeatedly updates the edge whose endpoint beliefs disagree most on its sepset (distance of
/// their projections, see [`CalibrationState::disagreement`]), alternating directions on each
/// edge, until no edge disagrees by `tolerance` or more. An edge that has not yet carried a
/// message in both directions has infinite priority.
pub(super) fn calibrate<P: Potential>(
    graph: &ClusterGraph<P>,
    state: &mut CalibrationState<P>,
    tolerance: f64,
    budget: &mut Budget,
) -> Result<Run> {
    let mut edges: Vec<EdgeSchedule> = (0..graph.num_edges())
        .map(|_| EdgeSchedule {
            next: 0,
            sent: [false; 2],
            version: 0,
        })
        .collect();
    let score = |state: &mut CalibrationState<P>, sched: &EdgeSchedule, edge: EdgeId| {
        if sched.sent.iter().all(|s| *s) {
            state.disagreement(graph, edge)
        } else {
            Ok(f64::INFINITY)
        }
    };
    let mut heap = BinaryHeap::with_capacity(edges.len());
    for (edge, sched) in edges.iter().enumerate() {
        heap.push(Entry {
            score: score(state, sched, edge)?,
            edge,
            version: 0,
        });
    }
    while let Some(entry) = heap.pop() {
        if entry.version != edges[entry.edge].version {
            continue;
        }
        if entry.score < tolerance {
            break;
        }
        if !budget.take() {
            return Ok(Run {
                converged: false,
                passes: 0,
            });
        }
        let (a, b) = graph.edge(entry.edge)?.clusters();
        let sched = &mut edges[entry.edge];
        let d = Directed {
            edge: entry.edge,
            from: a,
            to: b,
        };
        let d = if sched.next == 0 { d } else { d.reversed() };
        sched.sent[sched.next] = true;
        sched.next ^= 1;
        let change = state.send(graph, d)?;
        trace!(edge = entry.edge, score = entry.score, change, "prioritized update");
        for f in graph.adjacent_edges(d.to)? {
            let sched = &mut edges[*f];
            sched.version += 1;
            heap.push(Entry {
                score: score(state, sched, *f)?,
                edge: *f,
                version: sched.version,
            });
        }
    }
    Ok(Run {
        converged: true,
        passes: 0,
    })
}
