//! Variable-level undirected graphs and the junction tree construction pipeline:
//! moralization, elimination ordering, triangulation, clique extraction and maximum spanning
//! tree assembly.

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use crate::factor::Potential;
use crate::scope::{Scope, Variable};
use crate::{CalibraError, Result};

mod cliques;
mod elimination;
mod spanning_tree;
mod triangulate;

pub use cliques::{maximal_cliques, Clique};
pub use elimination::{EliminationHeuristic, FixedOrder, MinFill, NaiveOrder};
pub use spanning_tree::{maximum_spanning_tree, TreeEdge};
pub use triangulate::triangulate;

pub type NodeId = usize;
pub type FactorId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Both endpoints appear together in a factor.
    Moral,
    /// Added by triangulation, carries no factor.
    Fill,
}

#[derive(Debug, Clone)]
pub struct Node {
    variable: Variable,
    factors: Vec<FactorId>,
    neighbors: IndexSet<NodeId>,
}

impl Node {
    pub fn variable(&self) -> &Variable {
        &self.variable
    }
    /// Factors whose scope contains this node's variable.
    pub fn factors(&self) -> &[FactorId] {
        self.factors.as_slice()
    }
    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors.iter().copied()
    }
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }
}

/// Undirected graph over the variables of a set of factors.
///
/// Node ids follow the canonical (sorted by id) order of the variables.
#[derive(Debug, Clone)]
pub struct FactorGraph {
    nodes: IndexMap<String, Node>,
    // keyed by (low, high) node id
    edges: IndexMap<(NodeId, NodeId), EdgeKind>,
    factor_scopes: Vec<Scope>,
}

impl FactorGraph {
    /// Moral graph of `factors`: variables co-occurring in a factor are pairwise connected.
    pub fn moralize<P: Potential>(factors: &[P]) -> Self {
        Self::from_scopes(factors.iter().map(|f| f.scope().clone()).collect())
    }

    /// Moral graph of a list of factor scopes.
    pub fn from_scopes(factor_scopes: Vec<Scope>) -> Self {
        let all = factor_scopes
            .iter()
            .fold(Scope::empty(), |acc, s| acc.union(s));
        let nodes = all
            .iter()
            .map(|v| {
                (
                    v.id().to_owned(),
                    Node {
                        variable: v.clone(),
                        factors: Vec::new(),
                        neighbors: IndexSet::new(),
                    },
                )
            })
            .collect();
        let mut graph = Self {
            nodes,
            edges: IndexMap::new(),
            factor_scopes: Vec::new(),
        };
        for (factor_id, scope) in factor_scopes.iter().enumerate() {
            let ids: Vec<NodeId> = scope
                .ids()
                .filter_map(|id| graph.nodes.get_index_of(id))
                .collect();
            for n in ids.iter() {
                graph.nodes[*n].factors.push(factor_id);
            }
            for (a, b) in ids.iter().tuple_combinations() {
                graph.add_edge(*a, *b, EdgeKind::Moral);
            }
        }
        graph.factor_scopes = factor_scopes;
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn node_id(&self, id: &str) -> Result<NodeId> {
        self.nodes
            .get_index_of(id)
            .ok_or_else(|| CalibraError::UnknownVariable(id.to_owned()))
    }
    pub fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node]
    }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
    pub fn node_name(&self, node: NodeId) -> &str {
        self.nodes[node].variable.id()
    }
    /// Scope of all variables of the graph.
    pub fn scope(&self) -> Scope {
        Scope::new(self.nodes.values().map(|n| n.variable.clone()))
    }
    pub fn factor_scopes(&self) -> &[Scope] {
        self.factor_scopes.as_slice()
    }
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node].neighbors()
    }
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains_key(&edge_key(a, b))
    }
    /// Adds an undirected edge, returns false if it already existed (its kind is then kept).
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, kind: EdgeKind) -> bool {
        if a == b || self.has_edge(a, b) {
            return false;
        }
        self.edges.insert(edge_key(a, b), kind);
        self.nodes[a].neighbors.insert(b);
        self.nodes[b].neighbors.insert(a);
        true
    }
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, EdgeKind)> + '_ {
        self.edges.iter().map(|((a, b), k)| (*a, *b, *k))
    }
    /// Fill edges as pairs of variable ids, each pair in canonical order.
    pub fn fill_edges(&self) -> Vec<(String, String)> {
        self.edges()
            .filter(|(_, _, k)| *k == EdgeKind::Fill)
            .map(|(a, b, _)| (self.node_name(a).to_owned(), self.node_name(b).to_owned()))
            .collect()
    }
    /// True if every pair of `nodes` is connected.
    pub fn is_clique(&self, nodes: &[NodeId]) -> bool {
        nodes
            .iter()
            .tuple_combinations()
            .all(|(a, b)| self.has_edge(*a, *b))
    }
    /// Scope made of the variables of `nodes`.
    pub fn scope_of(&self, nodes: &[NodeId]) -> Scope {
        Scope::new(nodes.iter().map(|n| self.nodes[*n].variable.clone()))
    }
}

fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
