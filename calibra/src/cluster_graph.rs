//! Cluster graphs: clusters of variables holding factors, linked by edges labelled with
//! their sepsets. Junction trees are the tree-shaped special case used for exact inference.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::factor::Potential;
use crate::graph::{
    maximal_cliques, maximum_spanning_tree, triangulate, EliminationHeuristic, FactorGraph,
};
use crate::scope::Scope;
use crate::{CalibraError, Result};

pub type ClusterId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster<P> {
    scope: Scope,
    factors: Vec<P>,
}

impl<P: Potential> Cluster<P> {
    /// Every factor scope must be contained in `scope`.
    pub fn new(scope: Scope, factors: Vec<P>) -> Result<Self> {
        if let Some(f) = factors.iter().find(|f| !scope.contains_scope(f.scope())) {
            return Err(CalibraError::ScopeMismatch {
                inner: f.scope().id_list(),
                outer: scope.id_list(),
            });
        }
        Ok(Self { scope, factors })
    }
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
    pub fn factors(&self) -> &[P] {
        self.factors.as_slice()
    }
    /// Initial potential: product of the cluster's factors over the whole cluster scope.
    pub fn potential(&self) -> Result<P> {
        P::product_all(self.scope.clone(), self.factors.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    clusters: (ClusterId, ClusterId),
    sepset: Scope,
}

impl Edge {
    pub fn clusters(&self) -> (ClusterId, ClusterId) {
        self.clusters
    }
    pub fn sepset(&self) -> &Scope {
        &self.sepset
    }
    pub fn other_end(&self, cluster: ClusterId) -> Option<ClusterId> {
        match self.clusters {
            (a, b) if a == cluster => Some(b),
            (a, b) if b == cluster => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterGraph<P> {
    clusters: Vec<Cluster<P>>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<EdgeId>>,
}

impl<P: Potential> ClusterGraph<P> {
    /// Junction tree of `factors`: moralization, elimination order from `heuristic`,
    /// triangulation, maximal cliques and maximum spanning tree over the cliques.
    pub fn junction_tree(factors: &[P], heuristic: &dyn EliminationHeuristic) -> Result<Self> {
        let moral = FactorGraph::moralize(factors);
        let order = heuristic.order(&moral, &moral.scope())?;
        let chordal = triangulate(&moral, &order)?;
        let cliques = maximal_cliques(&chordal);
        let scopes: Vec<Scope> = cliques.iter().map(|c| c.scope.clone()).collect();
        let tree = maximum_spanning_tree(&scopes)?;
        let clusters = cliques
            .into_iter()
            .map(|c| Cluster {
                scope: c.scope,
                factors: c.factors.iter().map(|f| factors[*f].clone()).collect(),
            })
            .collect();
        let edges = tree
            .into_iter()
            .map(|e| Edge {
                clusters: e.clusters,
                sepset: e.sepset,
            })
            .collect();
        let graph = Self::assemble(clusters, edges);
        debug!(
            clusters = graph.num_clusters(),
            edges = graph.num_edges(),
            max_cluster_size = graph.clusters.iter().map(|c| c.scope.len()).max().unwrap_or(0),
            "junction tree built"
        );
        Ok(graph)
    }

    /// Cluster graph with the given clusters and edges (pairs of cluster indices). Sepsets are
    /// the scope intersections. The result may contain cycles.
    pub fn from_clusters(
        clusters: Vec<Cluster<P>>,
        edges: &[(ClusterId, ClusterId)],
    ) -> Result<Self> {
        let edges = edges
            .iter()
            .map(|(a, b)| {
                for c in [a, b] {
                    if *c >= clusters.len() {
                        return Err(CalibraError::UnknownCluster(*c));
                    }
                }
                Ok(Edge {
                    clusters: (*a, *b),
                    sepset: clusters[*a].scope.intersect(&clusters[*b].scope),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(clusters, edges))
    }

    /// Bethe cluster graph: one cluster per factor over two or more variables and one
    /// singleton cluster per variable, each factor cluster linked to the singletons of its
    /// variables. Single-variable factors are assigned to their singleton cluster.
    pub fn bethe(factors: &[P]) -> Result<Self> {
        let scope = factors
            .iter()
            .fold(Scope::empty(), |acc, f| acc.union(f.scope()));
        let mut clusters: Vec<Cluster<P>> = scope
            .iter()
            .map(|v| Cluster {
                scope: Scope::new([v.clone()]),
                factors: Vec::new(),
            })
            .collect();
        let mut edges = Vec::new();
        for f in factors {
            if f.scope().len() <= 1 {
                let target = f
                    .scope()
                    .ids()
                    .next()
                    .and_then(|id| scope.position(id))
                    .unwrap_or(0);
                if let Some(c) = clusters.get_mut(target) {
                    c.factors.push(f.clone());
                    continue;
                }
            }
            let id = clusters.len();
            clusters.push(Cluster {
                scope: f.scope().clone(),
                factors: vec![f.clone()],
            });
            for v in f.scope().ids() {
                if let Some(singleton) = scope.position(v) {
                    edges.push((id, singleton));
                }
            }
        }
        Self::from_clusters(clusters, &edges)
    }

    fn assemble(clusters: Vec<Cluster<P>>, edges: Vec<Edge>) -> Self {
        let mut adjacency = vec![Vec::new(); clusters.len()];
        for (id, e) in edges.iter().enumerate() {
            adjacency[e.clusters.0].push(id);
            adjacency[e.clusters.1].push(id);
        }
        Self {
            clusters,
            edges,
            adjacency,
        }
    }

    pub fn clusters(&self) -> &[Cluster<P>] {
        self.clusters.as_slice()
    }
    pub fn cluster(&self, id: ClusterId) -> Result<&Cluster<P>> {
        self.clusters
            .get(id)
            .ok_or(CalibraError::UnknownCluster(id))
    }
    pub fn edges(&self) -> &[Edge] {
        self.edges.as_slice()
    }
    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges.get(id).ok_or(CalibraError::UnknownEdge(id))
    }
    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
    /// Edges incident to `cluster`.
    pub fn adjacent_edges(&self, cluster: ClusterId) -> Result<&[EdgeId]> {
        self.adjacency
            .get(cluster)
            .map(Vec::as_slice)
            .ok_or(CalibraError::UnknownCluster(cluster))
    }
    /// The endpoint of `edge` which is not `cluster`.
    pub fn other_end(&self, edge: EdgeId, cluster: ClusterId) -> Result<ClusterId> {
        self.edge(edge)?
            .other_end(cluster)
            .ok_or(CalibraError::NotConnected { cluster, edge })
    }
    /// `(edge, neighbor)` pairs of `cluster`.
    pub fn neighbors(
        &self,
        cluster: ClusterId,
    ) -> Result<impl Iterator<Item = (EdgeId, ClusterId)> + '_> {
        Ok(self
            .adjacent_edges(cluster)?
            .iter()
            .filter_map(move |e| self.edges[*e].other_end(cluster).map(|c| (*e, c))))
    }
    /// Union of the cluster scopes.
    pub fn scope(&self) -> Scope {
        self.clusters
            .iter()
            .fold(Scope::empty(), |acc, c| acc.union(&c.scope))
    }
    /// Connected and acyclic (the empty graph is a tree).
    pub fn is_tree(&self) -> bool {
        if self.clusters.is_empty() {
            return true;
        }
        self.edges.len() + 1 == self.clusters.len() && self.is_connected()
    }
    fn is_connected(&self) -> bool {
        let mut seen = vec![false; self.clusters.len()];
        let mut stack = vec![0];
        seen[0] = true;
        while let Some(c) = stack.pop() {
            for e in self.adjacency[c].iter() {
                if let Some(n) = self.edges[*e].other_end(c) {
                    if !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                }
            }
        }
        seen.iter().all(|s| *s)
    }
    /// Smallest cluster (fewest variables, then fewest table entries) whose scope contains
    /// `scope`, ties going to the lowest id.
    pub fn smallest_covering_cluster(&self, scope: &Scope) -> Option<ClusterId> {
        self.clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.scope.contains_scope(scope))
            .min_by_key(|(id, c)| (c.scope.len(), c.scope.num_distinct_values(), *id))
            .map(|(id, _)| id)
    }
}
