use super::MessageKind;
use crate::cluster_graph::{ClusterGraph, ClusterId, EdgeId};
use crate::factor::Potential;
use crate::scope::Scope;
use crate::{CalibraError, Result};

/// A message travelling along `edge` from cluster `from` to cluster `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Directed {
    pub edge: EdgeId,
    pub from: ClusterId,
    pub to: ClusterId,
}

impl Directed {
    pub fn new<P: Potential>(graph: &ClusterGraph<P>, edge: EdgeId, from: ClusterId) -> Result<Self> {
        let to = graph.other_end(edge, from)?;
        Ok(Self { edge, from, to })
    }
    pub fn reversed(self) -> Self {
        Self {
            edge: self.edge,
            from: self.to,
            to: self.from,
        }
    }
}

/// A potential stored as a rescaled table and the log of the factor taken out of it.
#[derive(Debug, Clone)]
struct Scaled<P> {
    table: P,
    log_scale: f64,
}

impl<P: Potential> Scaled<P> {
    fn new(potential: P, log_scale: f64) -> Self {
        let (table, c) = potential.rescaled();
        Self {
            table,
            log_scale: log_scale + c,
        }
    }
    fn unit(scope: Scope) -> Result<Self> {
        Ok(Self {
            table: P::unit(scope)?,
            log_scale: 0.0,
        })
    }
    fn value(&self) -> P {
        self.table.scaled(self.log_scale)
    }
}

#[derive(Debug, Clone)]
struct ClusterBelief<P> {
    belief: Scaled<P>,
    // set when an incoming message changed since `belief` was computed (sum-product only)
    dirty: bool,
}

/// Mutable side of a calibration: the current belief of each cluster and the two directed
/// messages of each edge.
///
/// Messages start as unit potentials over the sepsets and beliefs as the initial cluster
/// potentials. The state is tied to the [`ClusterGraph`] it was built from, which must be
/// passed to every method that follows edges.
///
/// Messages and beliefs are kept rescaled together with the log of their scale, so that beliefs
/// retain the scale of the cluster potentials: on a calibrated tree, the belief of a cluster is
/// the unnormalized marginal of the product of all factors.
#[derive(Debug, Clone)]
pub struct CalibrationState<P> {
    kind: MessageKind,
    factors: Vec<Vec<P>>,
    potentials: Vec<P>,
    beliefs: Vec<ClusterBelief<P>>,
    // [first -> second, second -> first] in the order of `Edge::clusters`
    messages: Vec<[Scaled<P>; 2]>,
    frozen: bool,
}

impl<P: Potential> CalibrationState<P> {
    pub fn new(graph: &ClusterGraph<P>, kind: MessageKind) -> Result<Self> {
        let factors = graph
            .clusters()
            .iter()
            .map(|c| c.factors().to_vec())
            .collect();
        let potentials = graph
            .clusters()
            .iter()
            .map(|c| c.potential())
            .collect::<Result<Vec<_>>>()?;
        let mut res = Self {
            kind,
            factors,
            potentials,
            beliefs: Vec::new(),
            messages: Vec::new(),
            frozen: false,
        };
        res.reset(graph)?;
        Ok(res)
    }

    /// Forgets every message: beliefs go back to the cluster potentials.
    pub fn reset(&mut self, graph: &ClusterGraph<P>) -> Result<()> {
        self.messages = graph
            .edges()
            .iter()
            .map(|e| {
                Ok([
                    Scaled::unit(e.sepset().clone())?,
                    Scaled::unit(e.sepset().clone())?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;
        self.beliefs = self
            .potentials
            .iter()
            .map(|p| ClusterBelief {
                belief: Scaled::new(p.clone(), 0.0),
                dirty: false,
            })
            .collect();
        Ok(())
    }

    pub fn message_kind(&self) -> MessageKind {
        self.kind
    }
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
    /// Makes the cluster potentials read-only.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn slot(graph: &ClusterGraph<P>, d: Directed) -> Result<usize> {
        let (first, second) = graph.edge(d.edge)?.clusters();
        match (d.from, d.to) {
            (f, t) if f == first && t == second => Ok(0),
            (f, t) if f == second && t == first => Ok(1),
            (f, _) => Err(CalibraError::NotConnected {
                cluster: f,
                edge: d.edge,
            }),
        }
    }

    /// Current message along `edge` leaving `from`.
    pub fn message(&self, graph: &ClusterGraph<P>, edge: EdgeId, from: ClusterId) -> Result<P> {
        let d = Directed::new(graph, edge, from)?;
        Ok(self.messages[d.edge][Self::slot(graph, d)?].value())
    }

    /// Initial potential of `cluster` (product of its factors).
    pub fn potential(&self, cluster: ClusterId) -> Result<&P> {
        self.potentials
            .get(cluster)
            .ok_or(CalibraError::UnknownCluster(cluster))
    }

    /// Current belief of `cluster`: its potential times every incoming message.
    pub fn belief(&mut self, graph: &ClusterGraph<P>, cluster: ClusterId) -> Result<P> {
        Ok(self.current_belief(graph, cluster)?.value())
    }

    /// Rescaled belief of `cluster`, recomputed first if an incoming message changed.
    fn current_belief(&mut self, graph: &ClusterGraph<P>, cluster: ClusterId) -> Result<&Scaled<P>> {
        let dirty = self
            .beliefs
            .get(cluster)
            .ok_or(CalibraError::UnknownCluster(cluster))?
            .dirty;
        if dirty {
            let mut belief = self.potentials[cluster].clone();
            let mut log_scale = 0.0;
            for (edge, neighbor) in graph.neighbors(cluster)? {
                let d = Directed {
                    edge,
                    from: neighbor,
                    to: cluster,
                };
                let incoming = &self.messages[edge][Self::slot(graph, d)?];
                belief = belief.product(&incoming.table)?;
                log_scale += incoming.log_scale;
            }
            self.beliefs[cluster] = ClusterBelief {
                belief: Scaled::new(belief, log_scale),
                dirty: false,
            };
        }
        Ok(&self.beliefs[cluster].belief)
    }

    /// New value of the message `d`, not yet stored.
    fn compute_message(&mut self, graph: &ClusterGraph<P>, d: Directed) -> Result<Scaled<P>> {
        let sepset = graph.edge(d.edge)?.sepset().clone();
        match self.kind {
            MessageKind::SumProduct => {
                let mut acc = self.potentials[d.from].clone();
                let mut log_scale = 0.0;
                for (edge, neighbor) in graph.neighbors(d.from)? {
                    if edge == d.edge {
                        continue;
                    }
                    let incoming = Directed {
                        edge,
                        from: neighbor,
                        to: d.from,
                    };
                    let incoming = &self.messages[edge][Self::slot(graph, incoming)?];
                    acc = acc.product(&incoming.table)?;
                    log_scale += incoming.log_scale;
                }
                Ok(Scaled::new(acc.marginal(&sepset)?, log_scale))
            }
            MessageKind::BeliefUpdate => {
                let (projected, belief_scale) = {
                    let belief = self.current_belief(graph, d.from)?;
                    (belief.table.marginal(&sepset)?, belief.log_scale)
                };
                let reverse = &self.messages[d.edge][Self::slot(graph, d.reversed())?];
                Ok(Scaled::new(
                    projected.division(&reverse.table)?,
                    belief_scale - reverse.log_scale,
                ))
            }
        }
    }

    /// Stores `message` as the value of `d` and updates the receiving belief.
    fn set_message(&mut self, graph: &ClusterGraph<P>, d: Directed, message: Scaled<P>) -> Result<()> {
        let slot = Self::slot(graph, d)?;
        match self.kind {
            MessageKind::SumProduct => {
                self.beliefs[d.to].dirty = true;
            }
            MessageKind::BeliefUpdate => {
                let previous = &self.messages[d.edge][slot];
                let target = &mut self.beliefs[d.to];
                let table = target
                    .belief
                    .table
                    .division(&previous.table)?
                    .product(&message.table)?;
                let log_scale =
                    target.belief.log_scale - previous.log_scale + message.log_scale;
                target.belief = Scaled::new(table, log_scale);
            }
        }
        self.messages[d.edge][slot] = message;
        Ok(())
    }

    /// Recomputes and stores message `d`, returns its distance from the previous value.
    pub(crate) fn send(&mut self, graph: &ClusterGraph<P>, d: Directed) -> Result<f64> {
        let message = self.compute_message(graph, d)?;
        let change = message
            .table
            .distance(&self.messages[d.edge][Self::slot(graph, d)?].table)?;
        self.set_message(graph, d, message)?;
        Ok(change)
    }

    /// Distance between the projections of the beliefs of both endpoints of `edge` on its
    /// sepset. It does not depend on the scale of the beliefs.
    pub fn disagreement(&mut self, graph: &ClusterGraph<P>, edge: EdgeId) -> Result<f64> {
        let e = graph.edge(edge)?;
        let (a, b) = e.clusters();
        let sepset = e.sepset().clone();
        let pa = self.current_belief(graph, a)?.table.marginal(&sepset)?;
        let pb = self.current_belief(graph, b)?.table.marginal(&sepset)?;
        pa.distance(&pb)
    }

    /// Replaces factor `factor` of `cluster` and restarts calibration from scratch.
    ///
    /// Fails with [`CalibraError::ReadOnly`] once the state has been frozen.
    pub fn replace_factor_potential(
        &mut self,
        graph: &ClusterGraph<P>,
        cluster: ClusterId,
        factor: usize,
        potential: P,
    ) -> Result<()> {
        if self.frozen {
            return Err(CalibraError::ReadOnly);
        }
        let scope = graph.cluster(cluster)?.scope().clone();
        if !scope.contains_scope(potential.scope()) {
            return Err(CalibraError::ScopeMismatch {
                inner: potential.scope().id_list(),
                outer: scope.id_list(),
            });
        }
        let slot = self.factors[cluster]
            .get_mut(factor)
            .ok_or(CalibraError::UnknownFactor { cluster, factor })?;
        *slot = potential;
        self.potentials[cluster] = P::product_all(scope, self.factors[cluster].iter())?;
        self.reset(graph)
    }
}
