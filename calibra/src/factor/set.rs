use super::Potential;
use crate::scope::Scope;
use crate::Result;

/// A product of factors kept in factored form.
///
/// Inserting a factor whose scope is contained in the scope of a stored factor multiplies it
/// into that factor; stored factors whose scope is contained in the new one are absorbed by
/// it. Products are therefore only materialized over scopes that already exist.
#[derive(Debug, Clone)]
pub struct FactorSet<P: Potential> {
    factors: Vec<P>,
}

impl<P: Potential> Default for FactorSet<P> {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
        }
    }
}

impl<P: Potential> FactorSet<P> {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_factors<'a>(factors: impl IntoIterator<Item = &'a P>) -> Result<Self>
    where
        P: 'a,
    {
        let mut res = Self::new();
        for f in factors {
            res.insert(f.clone())?;
        }
        Ok(res)
    }
    pub fn insert(&mut self, factor: P) -> Result<()> {
        if let Some(host) = self
            .factors
            .iter_mut()
            .find(|f| f.scope().contains_scope(factor.scope()))
        {
            *host = host.product(&factor)?;
            return Ok(());
        }
        let (absorbed, kept): (Vec<P>, Vec<P>) = std::mem::take(&mut self.factors)
            .into_iter()
            .partition(|f| factor.scope().contains_scope(f.scope()));
        self.factors = kept;
        let mut factor = factor;
        for f in absorbed.iter() {
            factor = factor.product(f)?;
        }
        self.factors.push(factor);
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.factors.len()
    }
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.factors.iter()
    }
    pub fn into_vec(self) -> Vec<P> {
        self.factors
    }
    pub fn scope(&self) -> Scope {
        self.factors
            .iter()
            .fold(Scope::empty(), |acc, f| acc.union(f.scope()))
    }
    /// Removes and returns the factors whose scope contains the variable `id`.
    pub fn take_mentioning(&mut self, id: &str) -> Vec<P> {
        let (taken, kept): (Vec<P>, Vec<P>) = std::mem::take(&mut self.factors)
            .into_iter()
            .partition(|f| f.scope().contains(id));
        self.factors = kept;
        taken
    }
    /// Materializes the full product.
    pub fn product(&self) -> Result<P> {
        P::product_all(self.scope(), self.factors.iter())
    }
    pub fn marginal(&self, keep: &Scope) -> Result<P> {
        self.product()?.marginal(keep)
    }
}
