use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::debug;

use super::{FactorGraph, NodeId};
use crate::scope::Scope;
use crate::Result;

/// Strategy producing the order in which variables are summed out.
pub trait EliminationHeuristic: std::fmt::Debug {
    /// Order in which the variables of `eliminate` are removed from `graph`.
    fn order(&self, graph: &FactorGraph, eliminate: &Scope) -> Result<Vec<String>>;
}

/// Greedy min-fill: repeatedly eliminates the candidate whose removal adds the fewest fill
/// edges among its remaining neighbors. Ties go to the candidate first in canonical order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinFill;

/// A caller-provided order, returned unchanged (it is validated by its consumer).
#[derive(Debug, Clone, Default)]
pub struct FixedOrder(pub Vec<String>);

/// Eliminates in canonical order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveOrder;

impl EliminationHeuristic for MinFill {
    fn order(&self, graph: &FactorGraph, eliminate: &Scope) -> Result<Vec<String>> {
        let mut adjacency: Vec<BTreeSet<NodeId>> = (0..graph.len())
            .map(|n| graph.neighbors(n).collect())
            .collect();
        let mut candidates: BTreeSet<NodeId> = eliminate
            .ids()
            .map(|id| graph.node_id(id))
            .collect::<Result<_>>()?;
        let mut order = Vec::with_capacity(candidates.len());
        loop {
            let Some(best) = candidates
                .iter()
                .copied()
                .min_by_key(|n| (fill_count(&adjacency, *n), *n))
            else {
                break;
            };
            let neighbors: Vec<NodeId> = adjacency[best].iter().copied().collect();
            for (a, b) in neighbors.iter().tuple_combinations() {
                adjacency[*a].insert(*b);
                adjacency[*b].insert(*a);
            }
            for n in neighbors.iter() {
                adjacency[*n].remove(&best);
            }
            adjacency[best].clear();
            candidates.remove(&best);
            order.push(graph.node_name(best).to_owned());
        }
        debug!(?order, "min-fill elimination order");
        Ok(order)
    }
}

fn fill_count(adjacency: &[BTreeSet<NodeId>], node: NodeId) -> usize {
    adjacency[node]
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| !adjacency[**a].contains(*b))
        .count()
}

impl EliminationHeuristic for FixedOrder {
    fn order(&self, _graph: &FactorGraph, _eliminate: &Scope) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

impl EliminationHeuristic for NaiveOrder {
    fn order(&self, _graph: &FactorGraph, eliminate: &Scope) -> Result<Vec<String>> {
        Ok(eliminate.id_list())
    }
}
