use tracing::debug;

use crate::scope::Scope;
use crate::{CalibraError, Result};

/// An edge of the spanning tree: the indices of two clusters and their sepset.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEdge {
    pub clusters: (usize, usize),
    pub sepset: Scope,
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    partitions: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            partitions: n,
        }
    }
    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }
    /// Merges the partitions of `a` and `b`, false if they were already merged.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        self.partitions -= 1;
        true
    }
}

/// Kruskal maximum spanning tree over the clusters with the given scopes, edge weights being
/// sepset sizes. Only pairs with a non-empty sepset are candidates.
///
/// Equal weights are taken in input order: pairs `(i, j)` with `i < j`, lexicographically.
pub fn maximum_spanning_tree(scopes: &[Scope]) -> Result<Vec<TreeEdge>> {
    let mut candidates = Vec::new();
    for i in 0..scopes.len() {
        for j in (i + 1)..scopes.len() {
            let sepset = scopes[i].intersect(&scopes[j]);
            if !sepset.is_empty() {
                candidates.push(TreeEdge {
                    clusters: (i, j),
                    sepset,
                });
            }
        }
    }
    // stable sort keeps the input order among equal weights
    candidates.sort_by(|a, b| b.sepset.len().cmp(&a.sepset.len()));
    let mut partitions = UnionFind::new(scopes.len());
    let mut tree = Vec::with_capacity(scopes.len().saturating_sub(1));
    for edge in candidates {
        if partitions.partitions <= 1 {
            break;
        }
        if partitions.union(edge.clusters.0, edge.clusters.1) {
            tree.push(edge);
        }
    }
    if partitions.partitions > 1 {
        return Err(CalibraError::Disconnected {
            partitions: partitions.partitions,
        });
    }
    debug!(edges = tree.len(), "maximum spanning tree");
    Ok(tree)
}
