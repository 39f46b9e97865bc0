use tracing::debug;

use super::{check_projection, Inferencer};
use crate::factor::Potential;
use crate::scope::Scope;
use crate::Result;

/// Answers queries from the full joint, computed once on the first query.
///
/// Exponential in the number of variables, meant as a reference for small models.
#[derive(Debug, Clone)]
pub struct NaiveInferencer<P> {
    factors: Vec<P>,
    scope: Scope,
    joint: Option<P>,
}

impl<P: Potential> NaiveInferencer<P> {
    pub fn new(factors: Vec<P>) -> Self {
        let scope = factors
            .iter()
            .fold(Scope::empty(), |acc, f| acc.union(f.scope()));
        Self {
            factors,
            scope,
            joint: None,
        }
    }

    /// Product of all the factors.
    pub fn joint_factor(&mut self) -> Result<&P> {
        let joint = match self.joint.take() {
            Some(joint) => joint,
            None => {
                debug!(variables = self.scope.len(), "computing full joint");
                P::product_all(self.scope.clone(), self.factors.iter())?
            }
        };
        Ok(self.joint.insert(joint))
    }
}

impl<P: Potential> Inferencer<P> for NaiveInferencer<P> {
    fn model_scope(&self) -> &Scope {
        &self.scope
    }
    fn marginal(&mut self, projection: &Scope) -> Result<P> {
        check_projection(&self.scope, projection)?;
        self.joint_factor()?.marginal(projection)
    }
}
