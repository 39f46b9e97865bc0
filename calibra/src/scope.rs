//! Variables, scopes and the mixed-radix index arithmetic shared by all table factors.
//!
//! A [`Scope`] always exposes its variables sorted by id, so two scopes built from the same
//! ids enumerate assignments identically. Linear indices follow the [`IndexCoder`]
//! convention: the first canonical variable varies fastest.

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::{CalibraError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    Discrete { cardinality: usize },
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    id: String,
    kind: VariableKind,
}

impl Variable {
    /// A variable with `cardinality` values. Tables over a variable without values are rejected
    /// when the factor is built.
    pub fn discrete(id: impl Into<String>, cardinality: usize) -> Self {
        Self {
            id: id.into(),
            kind: VariableKind::Discrete { cardinality },
        }
    }
    pub fn continuous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: VariableKind::Continuous,
        }
    }
    pub fn id(&self) -> &str {
        self.id.as_str()
    }
    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }
    /// Number of values of a discrete variable, `None` for continuous ones.
    pub fn cardinality(&self) -> Option<usize> {
        match self.kind {
            VariableKind::Discrete { cardinality } => Some(cardinality),
            VariableKind::Continuous => None,
        }
    }
    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, VariableKind::Continuous)
    }
}

/// Bijection between linear indices and mixed-radix assignments.
///
/// `strides[i]` is the product of the cardinalities of dimensions `0..i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCoder {
    cardinalities: Vec<usize>,
    strides: Vec<usize>,
    size: usize,
}

impl IndexCoder {
    pub fn new(cardinalities: Vec<usize>) -> Self {
        let mut strides = Vec::with_capacity(cardinalities.len());
        let mut size = 1;
        for c in cardinalities.iter() {
            strides.push(size);
            size *= c;
        }
        Self {
            cardinalities,
            strides,
            size,
        }
    }
    pub fn cardinalities(&self) -> &[usize] {
        self.cardinalities.as_slice()
    }
    pub fn strides(&self) -> &[usize] {
        self.strides.as_slice()
    }
    /// Number of distinct assignments.
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn ndims(&self) -> usize {
        self.cardinalities.len()
    }
    pub fn encode(&self, assignment: &[usize]) -> usize {
        debug_assert_eq!(assignment.len(), self.cardinalities.len());
        assignment
            .iter()
            .zip(self.strides.iter())
            .map(|(a, s)| a * s)
            .sum()
    }
    /// Like [`IndexCoder::encode`], but validates the assignment first.
    pub fn checked_encode(&self, assignment: &[usize]) -> Result<usize> {
        self.check_assignment(assignment)?;
        Ok(self.encode(assignment))
    }
    pub fn check_assignment(&self, assignment: &[usize]) -> Result<()> {
        if assignment.len() != self.cardinalities.len()
            || assignment
                .iter()
                .zip(self.cardinalities.iter())
                .any(|(a, c)| a >= c)
        {
            return Err(CalibraError::InvalidAssignment {
                assignment: assignment.to_vec(),
                cardinalities: self.cardinalities.clone(),
            });
        }
        Ok(())
    }
    pub fn decode(&self, index: usize) -> Vec<usize> {
        let mut res = vec![0; self.cardinalities.len()];
        self.decode_into(index, res.as_mut_slice());
        res
    }
    pub fn decode_into(&self, mut index: usize, assignment: &mut [usize]) {
        debug_assert!(index < self.size);
        for (a, c) in assignment.iter_mut().zip(self.cardinalities.iter()) {
            *a = index % c;
            index /= c;
        }
    }
    /// All linear indices whose dimensions selected by `projection_mask` take the values given
    /// in `assignment` (values at unselected positions are ignored).
    ///
    /// Indices are returned in increasing order.
    pub fn indexes_for_projected_assignment(
        &self,
        assignment: &[usize],
        projection_mask: &[bool],
    ) -> Result<Vec<usize>> {
        if assignment.len() != self.ndims() || projection_mask.len() != self.ndims() {
            return Err(CalibraError::DimensionMismatch {
                what: "projected assignment",
                expected: self.ndims(),
                got: assignment.len().max(projection_mask.len()),
            });
        }
        let mut base = 0;
        let mut free = Vec::new();
        for (dim, (a, fixed)) in assignment.iter().zip(projection_mask.iter()).enumerate() {
            if *fixed {
                if *a >= self.cardinalities[dim] {
                    return Err(CalibraError::InvalidAssignment {
                        assignment: assignment.to_vec(),
                        cardinalities: self.cardinalities.clone(),
                    });
                }
                base += a * self.strides[dim];
            } else {
                free.push(dim);
            }
        }
        let count: usize = free.iter().map(|d| self.cardinalities[*d]).product();
        let mut res = Vec::with_capacity(count);
        let mut counter = vec![0; free.len()];
        let mut index = base;
        for _ in 0..count {
            res.push(index);
            for (digit, dim) in counter.iter_mut().zip(free.iter()) {
                *digit += 1;
                index += self.strides[*dim];
                if *digit < self.cardinalities[*dim] {
                    break;
                }
                index -= self.cardinalities[*dim] * self.strides[*dim];
                *digit = 0;
            }
        }
        Ok(res)
    }
}

/// An ordered set of variables, sorted by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct Scope {
    variables: Vec<Variable>,
    coder: IndexCoder,
}

impl From<Vec<Variable>> for Scope {
    fn from(variables: Vec<Variable>) -> Self {
        Self::new(variables)
    }
}

impl From<Scope> for Vec<Variable> {
    fn from(scope: Scope) -> Self {
        scope.variables
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables
    }
}
impl Eq for Scope {}

impl FromIterator<Variable> for Scope {
    fn from_iter<T: IntoIterator<Item = Variable>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl Scope {
    /// Builds the canonical scope of `variables`. When an id appears more than once, the first
    /// occurrence wins.
    pub fn new(variables: impl IntoIterator<Item = Variable>) -> Self {
        let mut variables: Vec<Variable> = variables.into_iter().collect();
        variables.sort_by(|a, b| a.id.cmp(&b.id));
        variables.dedup_by(|later, first| later.id == first.id);
        let coder = IndexCoder::new(
            variables
                .iter()
                .map(|v| v.cardinality().unwrap_or(1))
                .collect(),
        );
        Self { variables, coder }
    }
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
    pub fn variables(&self) -> &[Variable] {
        self.variables.as_slice()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.id())
    }
    pub fn id_list(&self) -> Vec<String> {
        self.ids().map(str::to_owned).collect()
    }
    pub fn len(&self) -> usize {
        self.variables.len()
    }
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
    pub fn position(&self, id: &str) -> Option<usize> {
        self.variables
            .binary_search_by(|v| v.id.as_str().cmp(id))
            .ok()
    }
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }
    pub fn variable(&self, id: &str) -> Result<&Variable> {
        self.position(id)
            .map(|i| &self.variables[i])
            .ok_or_else(|| CalibraError::UnknownVariable(id.to_owned()))
    }
    /// True if every variable of `other` belongs to this scope.
    pub fn contains_scope(&self, other: &Scope) -> bool {
        other.ids().all(|id| self.contains(id))
    }
    /// Fails with [`CalibraError::ScopeMismatch`] when an id belongs to both scopes with
    /// different kinds (or cardinalities).
    pub fn check_compatible(&self, other: &Scope) -> Result<()> {
        let conflict = self
            .variables
            .iter()
            .merge_join_by(other.variables.iter(), |a, b| a.id.cmp(&b.id))
            .any(|x| matches!(x, EitherOrBoth::Both(a, b) if a.kind != b.kind));
        if conflict {
            return Err(CalibraError::ScopeMismatch {
                inner: other.id_list(),
                outer: self.id_list(),
            });
        }
        Ok(())
    }
    pub fn is_disjoint(&self, other: &Scope) -> bool {
        other.ids().all(|id| !self.contains(id))
    }
    pub fn union(&self, other: &Scope) -> Scope {
        let variables = self
            .variables
            .iter()
            .merge_join_by(other.variables.iter(), |a, b| a.id.cmp(&b.id))
            .map(|x| match x {
                EitherOrBoth::Both(a, _) | EitherOrBoth::Left(a) | EitherOrBoth::Right(a) => {
                    a.clone()
                }
            });
        Scope::new(variables)
    }
    pub fn intersect(&self, other: &Scope) -> Scope {
        let variables = self
            .variables
            .iter()
            .merge_join_by(other.variables.iter(), |a, b| a.id.cmp(&b.id))
            .filter_map(|x| match x {
                EitherOrBoth::Both(a, _) => Some(a.clone()),
                _ => None,
            });
        Scope::new(variables)
    }
    /// This scope without the variables of `other`.
    pub fn reduce_by(&self, other: &Scope) -> Scope {
        Scope::new(
            self.variables
                .iter()
                .filter(|v| !other.contains(v.id()))
                .cloned(),
        )
    }
    pub fn reduce_by_ids(&self, ids: &[&str]) -> Scope {
        Scope::new(
            self.variables
                .iter()
                .filter(|v| !ids.contains(&v.id()))
                .cloned(),
        )
    }
    /// For each variable of this scope, its position in `other` (if any).
    pub fn create_mapping(&self, other: &Scope) -> Vec<Option<usize>> {
        self.variables
            .iter()
            .map(|v| other.position(v.id()))
            .collect()
    }
    /// Sub-scope with the given ids. Fails on unknown ids.
    pub fn select(&self, ids: &[&str]) -> Result<Scope> {
        ids.iter()
            .map(|id| self.variable(id).cloned())
            .collect::<Result<Vec<_>>>()
            .map(Scope::new)
    }
    pub fn coder(&self) -> &IndexCoder {
        &self.coder
    }
    pub fn cardinalities(&self) -> &[usize] {
        self.coder.cardinalities()
    }
    pub fn num_distinct_values(&self) -> usize {
        self.coder.size()
    }
    pub fn is_discrete(&self) -> bool {
        self.variables.iter().all(|v| !v.is_continuous())
    }
    pub fn is_continuous(&self) -> bool {
        self.variables.iter().all(|v| v.is_continuous())
    }
}

impl<'a> IntoIterator for &'a Scope {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;
    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}

/// Translates linear indices of data laid out in a foreign variable order into the canonical
/// order of a [`Scope`] (and back).
///
/// Both orders use the same convention: the first listed variable varies fastest.
#[derive(Debug, Clone)]
pub struct IndexMapper {
    from: IndexCoder,
    to: IndexCoder,
    // position in the canonical scope of each foreign dimension
    permutation: Vec<usize>,
}

impl IndexMapper {
    pub fn new(from: &[Variable], to: &Scope) -> Result<Self> {
        if from.len() != to.len() {
            return Err(CalibraError::ScopeMismatch {
                inner: from.iter().map(|v| v.id().to_owned()).collect(),
                outer: to.id_list(),
            });
        }
        let mut permutation = Vec::with_capacity(from.len());
        for v in from {
            let pos = to
                .position(v.id())
                .ok_or_else(|| CalibraError::UnknownVariable(v.id().to_owned()))?;
            if to.variables()[pos].kind() != v.kind() || permutation.contains(&pos) {
                return Err(CalibraError::ScopeMismatch {
                    inner: from.iter().map(|v| v.id().to_owned()).collect(),
                    outer: to.id_list(),
                });
            }
            permutation.push(pos);
        }
        let from = IndexCoder::new(
            from.iter()
                .map(|v| v.cardinality().unwrap_or(1))
                .collect(),
        );
        Ok(Self {
            from,
            to: to.coder().clone(),
            permutation,
        })
    }
    /// Canonical index of the foreign index `index`.
    pub fn map(&self, index: usize) -> usize {
        let foreign = self.from.decode(index);
        let mut canonical = vec![0; foreign.len()];
        for (a, p) in foreign.iter().zip(self.permutation.iter()) {
            canonical[*p] = *a;
        }
        self.to.encode(&canonical)
    }
    /// Reorders foreign-ordered values into canonical order.
    pub fn map_values(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_len(values.len())?;
        let mut res = vec![0.0; values.len()];
        for (i, v) in values.iter().enumerate() {
            res[self.map(i)] = *v;
        }
        Ok(res)
    }
    /// Reorders canonical values into the foreign order.
    pub fn unmap_values(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_len(values.len())?;
        Ok((0..values.len()).map(|i| values[self.map(i)]).collect())
    }
    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.from.size() {
            return Err(CalibraError::ValueCount {
                expected: self.from.size(),
                got: len,
            });
        }
        Ok(())
    }
}
