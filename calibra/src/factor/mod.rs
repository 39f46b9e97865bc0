//! Factor algebra.
//!
//! Two representations implement [`Potential`]: dense tables over discrete variables
//! ([`DiscreteFactor`]) and canonical-form Gaussians over continuous variables
//! ([`GaussianFactor`]). Message passing and inference are generic over the trait.

mod discrete;
mod gaussian;
mod set;

pub use discrete::DiscreteFactor;
pub use gaussian::GaussianFactor;
pub use set::FactorSet;

use crate::scope::Scope;
use crate::Result;

/// Operations shared by all factor representations.
///
/// Every operation returns a new factor; factors are never mutated in place.
pub trait Potential: Clone + std::fmt::Debug + Sized {
    fn scope(&self) -> &Scope;
    /// The neutral element of [`Potential::product`] over `scope`.
    fn unit(scope: Scope) -> Result<Self>;
    fn product(&self, other: &Self) -> Result<Self>;
    /// Marginalizes out every variable not in `keep`.
    fn marginal(&self, keep: &Scope) -> Result<Self>;
    /// `other.scope()` must be contained in `self.scope()`.
    fn division(&self, other: &Self) -> Result<Self>;
    fn normalize(&self) -> Result<Self>;
    /// Non-negative distance between two potentials over the same scope, zero when they
    /// represent the same normalized distribution. It grows linearly with small differences, so
    /// that it can be compared to a convergence tolerance.
    fn distance(&self, other: &Self) -> Result<f64>;
    /// Multiplies the potential by `exp(log_factor)`.
    fn scaled(&self, log_factor: f64) -> Self;
    /// Splits the potential into a rescaled copy and the log of the factor taken out, such that
    /// `rescaled.scaled(log_factor)` represents `self`. Message passing stores rescaled tables so
    /// that long loopy schedules neither overflow nor underflow. Log-space representations need
    /// no rescaling.
    fn rescaled(&self) -> (Self, f64) {
        (self.clone(), 0.0)
    }

    /// Product of all `factors`, `unit(scope)` when empty.
    fn product_all<'a>(scope: Scope, factors: impl IntoIterator<Item = &'a Self>) -> Result<Self>
    where
        Self: 'a,
    {
        let mut factors = factors.into_iter();
        let Some(first) = factors.next() else {
            return Self::unit(scope);
        };
        let mut acc = first.clone();
        for f in factors {
            acc = acc.product(f)?;
        }
        if !acc.scope().contains_scope(&scope) {
            acc = acc.product(&Self::unit(scope)?)?;
        }
        Ok(acc)
    }
}
