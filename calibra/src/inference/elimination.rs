use std::collections::HashSet;

use tracing::debug;

use super::{check_projection, Inferencer};
use crate::factor::{FactorSet, Potential};
use crate::graph::{EliminationHeuristic, FactorGraph, MinFill};
use crate::scope::Scope;
use crate::{CalibraError, Result};

/// Variable elimination: sums out the variables outside the query one at a time, multiplying
/// only the factors that mention the variable being eliminated.
#[derive(Debug)]
pub struct VariableElimination<P> {
    factors: Vec<P>,
    scope: Scope,
    heuristic: Box<dyn EliminationHeuristic>,
}

impl<P: Potential> VariableElimination<P> {
    /// Uses the min-fill heuristic.
    pub fn new(factors: Vec<P>) -> Self {
        Self::with_heuristic(factors, MinFill)
    }

    pub fn with_heuristic(factors: Vec<P>, heuristic: impl EliminationHeuristic + 'static) -> Self {
        let scope = factors
            .iter()
            .fold(Scope::empty(), |acc, f| acc.union(f.scope()));
        Self {
            factors,
            scope,
            heuristic: Box::new(heuristic),
        }
    }

    /// Order in which the variables outside `projection` are eliminated.
    pub fn elimination_order(&self, projection: &Scope) -> Result<Vec<String>> {
        let graph = FactorGraph::moralize(&self.factors);
        self.heuristic
            .order(&graph, &self.scope.reduce_by(projection))
    }

    /// Marginal on `projection` eliminating the variables in the given `order`.
    ///
    /// `projection` and `order` must be disjoint and together cover the model exactly.
    pub fn marginal_with_order(&self, projection: &Scope, order: &[String]) -> Result<P> {
        self.check_order(projection, order)?;
        let mut factors = FactorSet::from_factors(self.factors.iter())?;
        for id in order {
            let bucket = factors.take_mentioning(id);
            if bucket.is_empty() {
                continue;
            }
            let bucket_scope = bucket
                .iter()
                .fold(Scope::empty(), |acc, f| acc.union(f.scope()));
            let product = P::product_all(bucket_scope, bucket.iter())?;
            let reduced = product.marginal(&product.scope().reduce_by_ids(&[id.as_str()]))?;
            debug!(
                variable = id.as_str(),
                bucket = bucket.len(),
                width = product.scope().len(),
                "eliminated"
            );
            factors.insert(reduced)?;
        }
        P::product_all(projection.clone(), factors.iter())?.marginal(projection)
    }

    fn check_order(&self, projection: &Scope, order: &[String]) -> Result<()> {
        let error = || CalibraError::EliminationScope {
            projection: projection.id_list(),
            order: order.to_vec(),
            model: self.scope.id_list(),
        };
        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !self.scope.contains(id) || projection.contains(id) || !seen.insert(id.as_str()) {
                return Err(error());
            }
        }
        if !self.scope.contains_scope(projection) || seen.len() + projection.len() != self.scope.len()
        {
            return Err(error());
        }
        Ok(())
    }
}

impl<P: Potential> Inferencer<P> for VariableElimination<P> {
    fn model_scope(&self) -> &Scope {
        &self.scope
    }
    fn marginal(&mut self, projection: &Scope) -> Result<P> {
        check_projection(&self.scope, projection)?;
        let order = self.elimination_order(projection)?;
        self.marginal_with_order(projection, &order)
    }
}
