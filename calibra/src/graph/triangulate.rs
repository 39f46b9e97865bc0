use itertools::Itertools;
use tracing::debug;

use super::{EdgeKind, FactorGraph, NodeId};
use crate::{CalibraError, Result};

/// Replays the elimination `order` (a permutation of all the variables of `graph`) and returns
/// the chordal graph made of the original edges plus the fill edges added along the way.
pub fn triangulate(graph: &FactorGraph, order: &[String]) -> Result<FactorGraph> {
    if order.len() != graph.len() {
        return Err(CalibraError::EliminationOrder(format!(
            "order has {} variables, the graph has {}",
            order.len(),
            graph.len()
        )));
    }
    let mut eliminated = vec![false; graph.len()];
    let mut nodes = Vec::with_capacity(order.len());
    for id in order {
        let node = graph
            .node_id(id)
            .map_err(|_| CalibraError::EliminationOrder(format!("unknown variable {}", id)))?;
        if eliminated[node] {
            return Err(CalibraError::EliminationOrder(format!(
                "variable {} appears twice",
                id
            )));
        }
        eliminated[node] = true;
        nodes.push(node);
    }
    let mut chordal = graph.clone();
    let mut eliminated = vec![false; graph.len()];
    let mut fills = 0;
    for node in nodes {
        let remaining: Vec<NodeId> = chordal
            .neighbors(node)
            .filter(|n| !eliminated[*n])
            .collect();
        for (a, b) in remaining.into_iter().tuple_combinations() {
            if chordal.add_edge(a, b, EdgeKind::Fill) {
                fills += 1;
            }
        }
        eliminated[node] = true;
    }
    debug!(edges = chordal.num_edges(), fills, "triangulated graph");
    Ok(chordal)
}
