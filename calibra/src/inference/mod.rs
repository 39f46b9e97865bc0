//! Query answering.
//!
//! Three interchangeable engines implement [`Inferencer`]:
//! [`NaiveInferencer`] (full joint), [`VariableElimination`] and [`ClusterGraphInferencer`]
//! (calibrated cluster graph). On discrete models, [`DiscreteQueries`] adds point queries
//! on top of any of them.

use crate::factor::{DiscreteFactor, Potential};
use crate::scope::Scope;
use crate::{CalibraError, Result};

mod cluster;
mod elimination;
mod naive;

pub use cluster::ClusterGraphInferencer;
pub use elimination::VariableElimination;
pub use naive::NaiveInferencer;

pub trait Inferencer<P: Potential> {
    /// All the variables of the model.
    fn model_scope(&self) -> &Scope;
    /// Unnormalized marginal of the model on `projection`.
    fn marginal(&mut self, projection: &Scope) -> Result<P>;
}

/// Fails unless `projection` only contains variables of `model`.
pub(crate) fn check_projection(model: &Scope, projection: &Scope) -> Result<()> {
    if !model.contains_scope(projection) {
        return Err(CalibraError::ScopeMismatch {
            inner: projection.id_list(),
            outer: model.id_list(),
        });
    }
    Ok(())
}

/// Point queries on discrete models.
///
/// Joint values keep the scale of the model: on a Bayesian network they are probabilities, on a
/// Markov network they are unnormalized (their sum over all assignments is the partition
/// function). Conditional queries are normalized.
pub trait DiscreteQueries {
    /// Unnormalized marginal of the model at `projection = assignment`.
    fn joint(&mut self, projection: &Scope, assignment: &[usize]) -> Result<f64>;
    /// Unnormalized marginal at `projection = assignment, evidence_scope = evidence`: the joint
    /// value with the evidence applied, 0 when the assignment contradicts the evidence.
    fn joint_with_evidence(
        &mut self,
        projection: &Scope,
        assignment: &[usize],
        evidence_scope: &Scope,
        evidence: &[usize],
    ) -> Result<f64>;
    /// P(projection = assignment | evidence_scope = evidence), 0 when the evidence has
    /// probability 0.
    fn conditional(
        &mut self,
        projection: &Scope,
        assignment: &[usize],
        evidence_scope: &Scope,
        evidence: &[usize],
    ) -> Result<f64>;
    /// P(projection | evidence_scope = evidence) as a normalized factor over `projection`.
    fn conditional_distribution(
        &mut self,
        projection: &Scope,
        evidence_scope: &Scope,
        evidence: &[usize],
    ) -> Result<DiscreteFactor>;
}

/// Marginal of `inferencer` on `projection ∪ evidence_scope` with the evidence applied, and the
/// position of `assignment` (combined with the evidence) in it.
fn observed_marginal<T: Inferencer<DiscreteFactor> + ?Sized>(
    inferencer: &mut T,
    projection: &Scope,
    assignment: &[usize],
    evidence_scope: &Scope,
    evidence: &[usize],
) -> Result<(DiscreteFactor, Vec<usize>)> {
    projection.coder().check_assignment(assignment)?;
    let full = projection.union(evidence_scope);
    let observed = inferencer
        .marginal(&full)?
        .observation(evidence_scope, evidence)?;
    let mut point = vec![0; full.len()];
    for (var, value) in evidence_scope.iter().zip(evidence.iter()) {
        if let Some(pos) = full.position(var.id()) {
            point[pos] = *value;
        }
    }
    // on a shared variable the projection value wins, and the observation zeroes it out when
    // it contradicts the evidence
    for (var, value) in projection.iter().zip(assignment.iter()) {
        if let Some(pos) = full.position(var.id()) {
            point[pos] = *value;
        }
    }
    Ok((observed, point))
}

impl<T: Inferencer<DiscreteFactor> + ?Sized> DiscreteQueries for T {
    fn joint(&mut self, projection: &Scope, assignment: &[usize]) -> Result<f64> {
        self.marginal(projection)?.value(assignment)
    }

    fn joint_with_evidence(
        &mut self,
        projection: &Scope,
        assignment: &[usize],
        evidence_scope: &Scope,
        evidence: &[usize],
    ) -> Result<f64> {
        let (observed, point) =
            observed_marginal(self, projection, assignment, evidence_scope, evidence)?;
        observed.value(&point)
    }

    fn conditional(
        &mut self,
        projection: &Scope,
        assignment: &[usize],
        evidence_scope: &Scope,
        evidence: &[usize],
    ) -> Result<f64> {
        // both terms come from one marginal, so they share its scale
        let (observed, point) =
            observed_marginal(self, projection, assignment, evidence_scope, evidence)?;
        let evidence_mass = observed.sum();
        if evidence_mass == 0.0 {
            return Ok(0.0);
        }
        Ok(observed.value(&point)? / evidence_mass)
    }

    fn conditional_distribution(
        &mut self,
        projection: &Scope,
        evidence_scope: &Scope,
        evidence: &[usize],
    ) -> Result<DiscreteFactor> {
        let full = projection.union(evidence_scope);
        Ok(self
            .marginal(&full)?
            .observation(evidence_scope, evidence)?
            .marginal(projection)
            .normalize())
    }
}
