use ndarray::{Array1, ArcArray1, ArrayView1};
use serde::{Deserialize, Serialize};

use super::Potential;
use crate::scope::{IndexMapper, Scope, Variable};
use crate::{CalibraError, Result};

/// A table factor: one non-negative value per assignment of a discrete scope.
///
/// The value at linear index `i` is the potential of `scope.coder().decode(i)`.
/// The table is reference-counted, clones and identity marginals do not copy it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteFactor {
    scope: Scope,
    values: ArcArray1<f64>,
}

/// Walks all assignments of an outer scope (in linear index order) while tracking the
/// linear index of the projection of the current assignment on `N` inner scopes.
struct AlignedIndexes<'a, const N: usize> {
    cardinalities: &'a [usize],
    strides: [Vec<usize>; N],
    counter: Vec<usize>,
    current: [usize; N],
    remaining: usize,
}

impl<'a, const N: usize> AlignedIndexes<'a, N> {
    fn new(outer: &'a Scope, inner: [&Scope; N]) -> Self {
        Self {
            cardinalities: outer.cardinalities(),
            strides: inner.map(|s| projected_strides(outer, s)),
            counter: vec![0; outer.len()],
            current: [0; N],
            remaining: outer.num_distinct_values(),
        }
    }
}

impl<const N: usize> Iterator for AlignedIndexes<'_, N> {
    type Item = [usize; N];
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let res = self.current;
        for (dim, digit) in self.counter.iter_mut().enumerate() {
            *digit += 1;
            for (cur, strides) in self.current.iter_mut().zip(self.strides.iter()) {
                *cur += strides[dim];
            }
            if *digit < self.cardinalities[dim] {
                break;
            }
            *digit = 0;
            for (cur, strides) in self.current.iter_mut().zip(self.strides.iter()) {
                *cur -= self.cardinalities[dim] * strides[dim];
            }
        }
        Some(res)
    }
}

/// Stride in `inner` of each dimension of `outer` (0 for dimensions absent from `inner`).
fn projected_strides(outer: &Scope, inner: &Scope) -> Vec<usize> {
    outer
        .create_mapping(inner)
        .into_iter()
        .map(|p| p.map_or(0, |p| inner.coder().strides()[p]))
        .collect()
}

fn check_discrete(scope: &Scope) -> Result<()> {
    for v in scope.iter() {
        match v.cardinality() {
            None => return Err(CalibraError::NotDiscrete(v.id().to_owned())),
            Some(0) => return Err(CalibraError::InvalidCardinality(v.id().to_owned())),
            Some(_) => {}
        }
    }
    Ok(())
}

/// `(1+a) ln(1+a) + (1-a) ln(1-a)` for `a` in [-1, 1], accurate for small `a`.
fn js_term(a: f64) -> f64 {
    let a2 = a * a;
    if a.abs() < 1e-2 {
        // series: sum over k >= 1 of a^(2k) / (k (2k - 1))
        a2 * (1.0 + a2 * (1.0 / 6.0 + a2 * (1.0 / 15.0 + a2 / 28.0)))
    } else {
        let xlnx = |x: f64| if x <= 0.0 { 0.0 } else { x * x.ln() };
        xlnx(1.0 + a) + xlnx(1.0 - a)
    }
}

impl DiscreteFactor {
    pub fn new(scope: Scope, values: impl Into<Array1<f64>>) -> Result<Self> {
        check_discrete(&scope)?;
        let values = values.into();
        if values.len() != scope.num_distinct_values() {
            return Err(CalibraError::ValueCount {
                expected: scope.num_distinct_values(),
                got: values.len(),
            });
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(CalibraError::InvalidPotential(*v));
        }
        Ok(Self {
            scope,
            values: values.into_shared(),
        })
    }
    /// Builds the table by evaluating `f` on every assignment of `scope`.
    pub fn from_fn(scope: Scope, mut f: impl FnMut(&[usize]) -> f64) -> Result<Self> {
        let coder = scope.coder();
        let mut assignment = vec![0; scope.len()];
        let values: Vec<f64> = (0..coder.size())
            .map(|i| {
                coder.decode_into(i, assignment.as_mut_slice());
                f(assignment.as_slice())
            })
            .collect();
        Self::new(scope, values)
    }
    /// All entries equal to one.
    pub fn ones(scope: Scope) -> Result<Self> {
        let n = scope.num_distinct_values();
        Self::new(scope, Array1::ones(n))
    }
    pub fn uniform(scope: Scope) -> Result<Self> {
        let n = scope.num_distinct_values();
        Self::new(scope, Array1::from_elem(n, 1.0 / n as f64))
    }
    /// One at `assignment`, zero elsewhere.
    pub fn indicator(scope: Scope, assignment: &[usize]) -> Result<Self> {
        let index = scope.coder().checked_encode(assignment)?;
        let mut values = Array1::zeros(scope.num_distinct_values());
        values[index] = 1.0;
        Self::new(scope, values)
    }
    /// Builds a factor from values laid out with `variables` in the given (non-canonical)
    /// order, the first variable varying fastest.
    pub fn from_foreign_order(variables: &[Variable], values: &[f64]) -> Result<Self> {
        let scope = Scope::new(variables.iter().cloned());
        let mapper = IndexMapper::new(variables, &scope)?;
        let values = mapper.map_values(values)?;
        Self::new(scope, values)
    }
    /// Dense values laid out in the order of `variables` (which must be a permutation of the
    /// scope), the first variable varying fastest.
    pub fn export_in_order(&self, variables: &[Variable]) -> Result<Vec<f64>> {
        let mapper = IndexMapper::new(variables, &self.scope)?;
        mapper.unmap_values(&self.values.to_vec())
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
    /// Values in canonical index order.
    pub fn values(&self) -> ArrayView1<f64> {
        self.values.view()
    }
    pub fn value(&self, assignment: &[usize]) -> Result<f64> {
        Ok(self.values[self.scope.coder().checked_encode(assignment)?])
    }
    pub fn value_at(&self, index: usize) -> f64 {
        self.values[index]
    }
    pub fn sum(&self) -> f64 {
        self.values.sum()
    }

    /// Factor product over the union of both scopes.
    ///
    /// A variable id shared by both scopes must have the same cardinality in each.
    pub fn product(&self, other: &Self) -> Result<Self> {
        self.scope.check_compatible(&other.scope)?;
        let scope = self.scope.union(&other.scope);
        let values: Array1<f64> = AlignedIndexes::new(&scope, [&self.scope, &other.scope])
            .map(|[i, j]| self.values[i] * other.values[j])
            .collect();
        Ok(Self {
            scope,
            values: values.into_shared(),
        })
    }

    /// Sums out every variable not in `keep`. Returns `self` (sharing the table) when nothing
    /// has to be summed out.
    pub fn marginal(&self, keep: &Scope) -> Self {
        let keep = self.scope.intersect(keep);
        if keep.len() == self.scope.len() {
            return self.clone();
        }
        let mut values = Array1::zeros(keep.num_distinct_values());
        for (v, [o]) in self
            .values
            .iter()
            .zip(AlignedIndexes::new(&self.scope, [&keep]))
        {
            values[o] += *v;
        }
        Self {
            scope: keep,
            values: values.into_shared(),
        }
    }

    /// Pointwise division by a factor over a sub-scope, with `0/0 = 0`.
    pub fn division(&self, other: &Self) -> Result<Self> {
        self.scope.check_compatible(&other.scope)?;
        if !self.scope.contains_scope(&other.scope) {
            return Err(CalibraError::ScopeMismatch {
                inner: other.scope.id_list(),
                outer: self.scope.id_list(),
            });
        }
        let mut values = Array1::zeros(self.values.len());
        for (index, [j]) in AlignedIndexes::new(&self.scope, [&other.scope]).enumerate() {
            let (num, den) = (self.values[index], other.values[j]);
            values[index] = if den != 0.0 {
                num / den
            } else if num == 0.0 {
                0.0
            } else {
                return Err(CalibraError::DivisionByZero {
                    index,
                    numerator: num,
                });
            };
        }
        Ok(Self {
            scope: self.scope.clone(),
            values: values.into_shared(),
        })
    }

    /// Zeroes every entry inconsistent with the observed `values` of `evidence`.
    ///
    /// The scope is kept unchanged; evidence on variables outside the scope is ignored.
    pub fn observation(&self, evidence: &Scope, values: &[usize]) -> Result<Self> {
        if values.len() != evidence.len() {
            return Err(CalibraError::ValueCount {
                expected: evidence.len(),
                got: values.len(),
            });
        }
        evidence.coder().check_assignment(values)?;
        self.scope.check_compatible(evidence)?;
        let mut assignment = vec![0; self.scope.len()];
        let mut mask = vec![false; self.scope.len()];
        for (var, value) in evidence.iter().zip(values.iter()) {
            if let Some(pos) = self.scope.position(var.id()) {
                assignment[pos] = *value;
                mask[pos] = true;
            }
        }
        if !mask.iter().any(|m| *m) {
            return Ok(self.clone());
        }
        let kept = self
            .scope
            .coder()
            .indexes_for_projected_assignment(&assignment, &mask)?;
        let mut res = Array1::zeros(self.values.len());
        for i in kept {
            res[i] = self.values[i];
        }
        Ok(Self {
            scope: self.scope.clone(),
            values: res.into_shared(),
        })
    }

    /// Scales the table to sum to one. An all-zero table is returned unchanged.
    pub fn normalize(&self) -> Self {
        let sum = self.sum();
        if sum == 0.0 {
            return self.clone();
        }
        Self {
            scope: self.scope.clone(),
            values: self.values.mapv(|x| x / sum).into_shared(),
        }
    }

    /// Jensen-Shannon divergence (natural log) between the normalized tables.
    ///
    /// Two all-zero tables have divergence 0, an all-zero table against a non-zero one has the
    /// maximal divergence ln(2). Entries are combined as `m g(a)` with `m = (p + q) / 2` and
    /// `a = (p - q) / (p + q)`, so that nearly equal tables do not lose the result to
    /// cancellation.
    pub fn jensen_shannon(&self, other: &Self) -> Result<f64> {
        if self.scope != other.scope {
            return Err(CalibraError::ScopeMismatch {
                inner: other.scope.id_list(),
                outer: self.scope.id_list(),
            });
        }
        let (sp, sq) = (self.sum(), other.sum());
        match (sp == 0.0, sq == 0.0) {
            (true, true) => return Ok(0.0),
            (true, false) | (false, true) => return Ok(std::f64::consts::LN_2),
            (false, false) => {}
        }
        let js = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(p, q)| {
                let (p, q) = (p / sp, q / sq);
                if p + q == 0.0 {
                    return 0.0;
                }
                0.5 * (p + q) * js_term((p - q) / (p + q))
            })
            .sum::<f64>();
        Ok((0.5 * js).max(0.0))
    }

    /// Jensen-Shannon distance: square root of [`DiscreteFactor::jensen_shannon`]. It is a
    /// metric and grows linearly with small differences between the normalized tables.
    pub fn jensen_shannon_distance(&self, other: &Self) -> Result<f64> {
        self.jensen_shannon(other).map(f64::sqrt)
    }

    /// Largest absolute difference between the entries of two factors over the same scope.
    pub fn max_abs_difference(&self, other: &Self) -> Result<f64> {
        if self.scope != other.scope {
            return Err(CalibraError::ScopeMismatch {
                inner: other.scope.id_list(),
                outer: self.scope.id_list(),
            });
        }
        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }
}

impl Potential for DiscreteFactor {
    fn scope(&self) -> &Scope {
        &self.scope
    }
    fn unit(scope: Scope) -> Result<Self> {
        Self::ones(scope)
    }
    fn product(&self, other: &Self) -> Result<Self> {
        DiscreteFactor::product(self, other)
    }
    fn marginal(&self, keep: &Scope) -> Result<Self> {
        Ok(DiscreteFactor::marginal(self, keep))
    }
    fn division(&self, other: &Self) -> Result<Self> {
        DiscreteFactor::division(self, other)
    }
    fn normalize(&self) -> Result<Self> {
        Ok(DiscreteFactor::normalize(self))
    }
    fn distance(&self, other: &Self) -> Result<f64> {
        self.jensen_shannon_distance(other)
    }
    fn rescaled(&self) -> (Self, f64) {
        let sum = self.sum();
        if sum == 0.0 || !sum.is_finite() {
            return (self.clone(), 0.0);
        }
        (DiscreteFactor::normalize(self), sum.ln())
    }
    fn scaled(&self, log_factor: f64) -> Self {
        if log_factor == 0.0 {
            return self.clone();
        }
        let factor = log_factor.exp();
        Self {
            scope: self.scope.clone(),
            values: self.values.mapv(|x| x * factor).into_shared(),
        }
    }
}
