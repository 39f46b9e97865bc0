use std::cmp::Reverse;

use tracing::debug;

use super::{FactorGraph, FactorId, NodeId};
use crate::scope::Scope;

/// A maximal clique of a chordal graph with the factors assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Clique {
    pub scope: Scope,
    pub factors: Vec<FactorId>,
}

/// Maximal cliques of the chordal graph `chordal`, found by maximum-cardinality search.
///
/// The search starts at node 0 and breaks ties on the number of marked neighbors by lowest
/// node id. A candidate clique grows while the next marked node is adjacent to all of its
/// members. When a candidate is closed, it claims every factor of the graph not yet claimed
/// whose scope it contains.
pub fn maximal_cliques(chordal: &FactorGraph) -> Vec<Clique> {
    let n = chordal.len();
    let mut marked = vec![false; n];
    let mut weight = vec![0usize; n];
    let mut claimed = vec![false; chordal.factor_scopes().len()];
    let mut cliques = Vec::new();
    let mut candidate: Vec<NodeId> = Vec::new();
    loop {
        let Some(next) = (0..n)
            .filter(|v| !marked[*v])
            .max_by_key(|v| (weight[*v], Reverse(*v)))
        else {
            break;
        };
        if !candidate.iter().all(|c| chordal.has_edge(*c, next)) {
            cliques.push(close(chordal, &candidate, &mut claimed));
            candidate = chordal.neighbors(next).filter(|v| marked[*v]).collect();
        }
        candidate.push(next);
        marked[next] = true;
        for v in chordal.neighbors(next) {
            weight[v] += 1;
        }
    }
    if !candidate.is_empty() {
        cliques.push(close(chordal, &candidate, &mut claimed));
    }
    debug!(cliques = cliques.len(), "maximum-cardinality search");
    cliques
}

fn close(chordal: &FactorGraph, nodes: &[NodeId], claimed: &mut [bool]) -> Clique {
    let scope = chordal.scope_of(nodes);
    let mut factors = Vec::new();
    for (id, factor_scope) in chordal.factor_scopes().iter().enumerate() {
        if !claimed[id] && scope.contains_scope(factor_scope) {
            claimed[id] = true;
            factors.push(id);
        }
    }
    Clique { scope, factors }
}
