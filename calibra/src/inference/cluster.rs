use super::{check_projection, Inferencer};
use crate::calibration::{calibrate, CalibrationConfig, CalibrationReport, CalibrationState};
use crate::cluster_graph::{ClusterGraph, ClusterId};
use crate::factor::Potential;
use crate::graph::{EliminationHeuristic, MinFill};
use crate::scope::Scope;
use crate::{CalibraError, Result};

/// Answers queries from the beliefs of a calibrated cluster graph.
///
/// Calibration runs on the first query; later queries reuse the cached beliefs. A query must
/// be covered by a single cluster.
#[derive(Debug, Clone)]
pub struct ClusterGraphInferencer<P> {
    graph: ClusterGraph<P>,
    config: CalibrationConfig,
    state: CalibrationState<P>,
    report: Option<CalibrationReport>,
    scope: Scope,
}

impl<P: Potential> ClusterGraphInferencer<P> {
    /// Exact inference on the min-fill junction tree of `factors`.
    pub fn new(factors: &[P]) -> Result<Self> {
        Self::junction_tree(factors, &MinFill, CalibrationConfig::default())
    }

    pub fn junction_tree(
        factors: &[P],
        heuristic: &dyn EliminationHeuristic,
        config: CalibrationConfig,
    ) -> Result<Self> {
        Self::with_graph(ClusterGraph::junction_tree(factors, heuristic)?, config)
    }

    pub fn with_graph(graph: ClusterGraph<P>, config: CalibrationConfig) -> Result<Self> {
        let config = config.validate()?;
        let state = CalibrationState::new(&graph, config.message_kind)?;
        let scope = graph.scope();
        Ok(Self {
            graph,
            config,
            state,
            report: None,
            scope,
        })
    }

    pub fn graph(&self) -> &ClusterGraph<P> {
        &self.graph
    }
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }
    pub fn state(&self) -> &CalibrationState<P> {
        &self.state
    }
    /// Outcome of the calibration, `None` before the first query.
    pub fn report(&self) -> Option<&CalibrationReport> {
        self.report.as_ref()
    }

    /// Calibrates the graph unless already done. The state is frozen afterwards.
    pub fn calibrate(&mut self) -> Result<CalibrationReport> {
        if let Some(report) = self.report {
            return Ok(report);
        }
        let report = calibrate(&self.graph, &mut self.state, &self.config)?;
        self.state.freeze();
        self.report = Some(report);
        Ok(report)
    }

    /// Replaces a factor of a cluster. Only possible before the first query.
    pub fn replace_factor_potential(
        &mut self,
        cluster: ClusterId,
        factor: usize,
        potential: P,
    ) -> Result<()> {
        self.state
            .replace_factor_potential(&self.graph, cluster, factor, potential)
    }

    /// Calibrated belief of `cluster`. On a junction tree it is the unnormalized marginal of the
    /// model on the cluster scope; on a loopy graph only its normalized form is meaningful.
    pub fn belief(&mut self, cluster: ClusterId) -> Result<P> {
        self.calibrate()?;
        self.state.belief(&self.graph, cluster)
    }
}

impl<P: Potential> Inferencer<P> for ClusterGraphInferencer<P> {
    fn model_scope(&self) -> &Scope {
        &self.scope
    }
    fn marginal(&mut self, projection: &Scope) -> Result<P> {
        check_projection(&self.scope, projection)?;
        let cluster = self
            .graph
            .smallest_covering_cluster(projection)
            .ok_or_else(|| CalibraError::UncoveredQuery(projection.id_list()))?;
        self.calibrate()?;
        self.state.belief(&self.graph, cluster)?.marginal(projection)
    }
}
