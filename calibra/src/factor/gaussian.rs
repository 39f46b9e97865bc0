use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, NewAxis};
use serde::{Deserialize, Serialize};

use super::Potential;
use crate::linalg;
use crate::scope::{Scope, Variable};
use crate::{CalibraError, Result};

const LN_2PI: f64 = 1.8378770664093453;

/// Gaussian potential in canonical (information) form:
/// `exp(g + hᵀx - ½ xᵀKx)` over the continuous variables of `scope`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianFactor {
    scope: Scope,
    precision: Array2<f64>,
    scaled_mean: Array1<f64>,
    log_normalizer: f64,
}

fn check_continuous(scope: &Scope) -> Result<()> {
    if let Some(v) = scope.iter().find(|v| !v.is_continuous()) {
        return Err(CalibraError::NotContinuous(v.id().to_owned()));
    }
    Ok(())
}

fn check_dim(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(CalibraError::DimensionMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

impl GaussianFactor {
    pub fn new(
        scope: Scope,
        precision: Array2<f64>,
        scaled_mean: Array1<f64>,
        log_normalizer: f64,
    ) -> Result<Self> {
        check_continuous(&scope)?;
        let d = scope.len();
        check_dim("precision rows", d, precision.nrows())?;
        check_dim("precision columns", d, precision.ncols())?;
        check_dim("scaled mean", d, scaled_mean.len())?;
        Ok(Self {
            scope,
            precision,
            scaled_mean,
            log_normalizer,
        })
    }

    /// Normalized density with the given mean and covariance, both in canonical order of
    /// `scope`.
    pub fn from_moment_form(
        scope: Scope,
        mean: ArrayView1<f64>,
        covariance: ArrayView2<f64>,
    ) -> Result<Self> {
        check_continuous(&scope)?;
        let d = scope.len();
        check_dim("mean", d, mean.len())?;
        check_dim("covariance rows", d, covariance.nrows())?;
        check_dim("covariance columns", d, covariance.ncols())?;
        let (precision, log_det_cov) = linalg::inverse_log_det(covariance, "covariance")?;
        let scaled_mean = precision.dot(&mean);
        let log_normalizer =
            -0.5 * scaled_mean.dot(&mean) - 0.5 * (d as f64 * LN_2PI + log_det_cov);
        Self::new(scope, precision, scaled_mean, log_normalizer)
    }

    /// Conditional density of `child = intercept + Σ weights[i] * parents[i] + ε`, with
    /// `ε ~ N(0, variance)`. Parents may be listed in any order.
    pub fn linear_conditional(
        child: Variable,
        parents: &[Variable],
        weights: &[f64],
        intercept: f64,
        variance: f64,
    ) -> Result<Self> {
        check_dim("weights", parents.len(), weights.len())?;
        if !(variance > 0.0) {
            return Err(CalibraError::Singular("conditional variance"));
        }
        let scope = Scope::new(parents.iter().cloned().chain(std::iter::once(child.clone())));
        check_continuous(&scope)?;
        check_dim("distinct parents", parents.len() + 1, scope.len())?;
        // coefficient of each scope variable in (child - Σ w x): child has 1, parents -w
        let mut coefs = Array1::<f64>::zeros(scope.len());
        coefs[scope.position(child.id()).unwrap_or_default()] = 1.0;
        for (p, w) in parents.iter().zip(weights.iter()) {
            if let Some(pos) = scope.position(p.id()) {
                coefs[pos] = -w;
            }
        }
        let precision = outer(&coefs, &coefs) / variance;
        let scaled_mean = &coefs * (intercept / variance);
        let log_normalizer =
            -0.5 * intercept * intercept / variance - 0.5 * (LN_2PI + variance.ln());
        Self::new(scope, precision, scaled_mean, log_normalizer)
    }

    pub fn unit(scope: Scope) -> Result<Self> {
        let d = scope.len();
        Self::new(scope, Array2::zeros((d, d)), Array1::zeros(d), 0.0)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
    pub fn precision(&self) -> ArrayView2<f64> {
        self.precision.view()
    }
    pub fn scaled_mean(&self) -> ArrayView1<f64> {
        self.scaled_mean.view()
    }
    pub fn log_normalizer(&self) -> f64 {
        self.log_normalizer
    }

    /// Mean and covariance. Requires a positive-definite precision.
    pub fn to_moment_form(&self) -> Result<(Array1<f64>, Array2<f64>)> {
        let (covariance, _) = linalg::inverse_log_det(self.precision.view(), "precision")?;
        let mean = covariance.dot(&self.scaled_mean);
        Ok((mean, covariance))
    }

    pub fn log_density(&self, x: ArrayView1<f64>) -> Result<f64> {
        check_dim("point", self.scope.len(), x.len())?;
        Ok(self.log_normalizer + self.scaled_mean.dot(&x) - 0.5 * x.dot(&self.precision.dot(&x)))
    }
    pub fn density(&self, x: ArrayView1<f64>) -> Result<f64> {
        self.log_density(x).map(f64::exp)
    }

    /// K and h embedded (zero padded) into the larger scope `scope`.
    fn padded(&self, scope: &Scope) -> (Array2<f64>, Array1<f64>) {
        let d = scope.len();
        let mapping = self.scope.create_mapping(scope);
        let mut precision = Array2::zeros((d, d));
        let mut scaled_mean = Array1::zeros(d);
        for (i, pi) in mapping.iter().enumerate() {
            let Some(pi) = pi else { continue };
            scaled_mean[*pi] = self.scaled_mean[i];
            for (j, pj) in mapping.iter().enumerate() {
                if let Some(pj) = pj {
                    precision[(*pi, *pj)] = self.precision[(i, j)];
                }
            }
        }
        (precision, scaled_mean)
    }

    pub fn product(&self, other: &Self) -> Self {
        let scope = self.scope.union(&other.scope);
        let (ka, ha) = self.padded(&scope);
        let (kb, hb) = other.padded(&scope);
        Self {
            scope,
            precision: ka + kb,
            scaled_mean: ha + hb,
            log_normalizer: self.log_normalizer + other.log_normalizer,
        }
    }

    pub fn division(&self, other: &Self) -> Result<Self> {
        if !self.scope.contains_scope(&other.scope) {
            return Err(CalibraError::ScopeMismatch {
                inner: other.scope.id_list(),
                outer: self.scope.id_list(),
            });
        }
        let (kb, hb) = other.padded(&self.scope);
        Ok(Self {
            scope: self.scope.clone(),
            precision: &self.precision - &kb,
            scaled_mean: &self.scaled_mean - &hb,
            log_normalizer: self.log_normalizer - other.log_normalizer,
        })
    }

    /// Positions (in this scope) of the variables kept and removed by a projection on `keep`.
    fn split(&self, keep: &Scope) -> (Vec<usize>, Vec<usize>) {
        (0..self.scope.len()).partition(|i| keep.contains(self.scope.variables()[*i].id()))
    }

    /// Integrates out the variables not in `keep` (Schur complement).
    ///
    /// Fails with [`CalibraError::Singular`] when the precision block of the removed variables
    /// is not positive definite.
    pub fn marginal(&self, keep: &Scope) -> Result<Self> {
        let (x, y) = self.split(keep);
        if y.is_empty() {
            return Ok(self.clone());
        }
        let kxx = self.precision.select(Axis(0), &x).select(Axis(1), &x);
        let kxy = self.precision.select(Axis(0), &x).select(Axis(1), &y);
        let kyy = self.precision.select(Axis(0), &y).select(Axis(1), &y);
        let hx = self.scaled_mean.select(Axis(0), &x);
        let hy = self.scaled_mean.select(Axis(0), &y);
        let (kyy_inv, log_det_kyy) = linalg::inverse_log_det(kyy.view(), "marginalized block")?;
        let kxy_kyy_inv = kxy.dot(&kyy_inv);
        let precision = &kxx - &kxy_kyy_inv.dot(&kxy.t());
        let scaled_mean = &hx - &kxy_kyy_inv.dot(&hy);
        let log_normalizer = self.log_normalizer
            + 0.5 * (y.len() as f64 * LN_2PI - log_det_kyy + hy.dot(&kyy_inv.dot(&hy)));
        let scope = Scope::new(x.iter().map(|i| self.scope.variables()[*i].clone()));
        Ok(Self {
            scope,
            precision,
            scaled_mean,
            log_normalizer,
        })
    }

    /// Conditions on observed values of (some of) the variables; observed variables are
    /// removed from the scope. Evidence on variables outside the scope is ignored.
    pub fn observation(&self, evidence: &Scope, values: &[f64]) -> Result<Self> {
        check_dim("evidence values", evidence.len(), values.len())?;
        let observed: Vec<(usize, f64)> = evidence
            .ids()
            .zip(values.iter())
            .filter_map(|(id, v)| self.scope.position(id).map(|p| (p, *v)))
            .collect();
        if observed.is_empty() {
            return Ok(self.clone());
        }
        let y: Vec<usize> = observed.iter().map(|(p, _)| *p).collect();
        let yv: Array1<f64> = observed.iter().map(|(_, v)| *v).collect();
        let x: Vec<usize> = (0..self.scope.len()).filter(|i| !y.contains(i)).collect();
        let kxx = self.precision.select(Axis(0), &x).select(Axis(1), &x);
        let kxy = self.precision.select(Axis(0), &x).select(Axis(1), &y);
        let kyy = self.precision.select(Axis(0), &y).select(Axis(1), &y);
        let hx = self.scaled_mean.select(Axis(0), &x);
        let hy = self.scaled_mean.select(Axis(0), &y);
        let scaled_mean = &hx - &kxy.dot(&yv);
        let log_normalizer = self.log_normalizer + hy.dot(&yv) - 0.5 * yv.dot(&kyy.dot(&yv));
        let scope = Scope::new(x.iter().map(|i| self.scope.variables()[*i].clone()));
        Ok(Self {
            scope,
            precision: kxx,
            scaled_mean,
            log_normalizer,
        })
    }

    /// Sets g such that the density integrates to one.
    pub fn normalize(&self) -> Result<Self> {
        let d = self.scope.len();
        if d == 0 {
            return Ok(Self {
                log_normalizer: 0.0,
                ..self.clone()
            });
        }
        let chol = linalg::cholesky(self.precision.view(), "precision")?;
        let mean = linalg::solve(&chol, self.scaled_mean.view());
        let log_normalizer =
            -0.5 * self.scaled_mean.dot(&mean) - 0.5 * (d as f64 * LN_2PI - linalg::log_det(&chol));
        Ok(Self {
            log_normalizer,
            ..self.clone()
        })
    }

    /// Symmetrized Kullback-Leibler divergence of the normalized densities when both precisions
    /// are positive definite, largest absolute difference of K and h otherwise.
    pub fn divergence(&self, other: &Self) -> Result<f64> {
        if self.scope != other.scope {
            return Err(CalibraError::ScopeMismatch {
                inner: other.scope.id_list(),
                outer: self.scope.id_list(),
            });
        }
        if self.scope.is_empty() {
            return Ok(0.0);
        }
        if linalg::is_positive_definite(self.precision.view())
            && linalg::is_positive_definite(other.precision.view())
        {
            let kl = |a: &Self, b: &Self| -> Result<f64> {
                let (mean_a, cov_a) = a.to_moment_form()?;
                let (mean_b, _) = b.to_moment_form()?;
                let chol_a = linalg::cholesky(a.precision.view(), "precision")?;
                let chol_b = linalg::cholesky(b.precision.view(), "precision")?;
                let diff = &mean_b - &mean_a;
                let trace = (&b.precision * &cov_a.t()).sum();
                let d = a.scope.len() as f64;
                Ok(0.5
                    * (trace + diff.dot(&b.precision.dot(&diff)) - d
                        + linalg::log_det(&chol_a)
                        - linalg::log_det(&chol_b)))
            };
            Ok((0.5 * (kl(self, other)? + kl(other, self)?)).max(0.0))
        } else {
            Ok(max_abs_diff(&self.precision, &other.precision)
                .max(max_abs_diff(&self.scaled_mean, &other.scaled_mean)))
        }
    }

    /// Largest absolute difference of the means and covariances when both precisions are
    /// positive definite, of K and h otherwise. Unlike [`GaussianFactor::divergence`] it grows
    /// linearly with small perturbations, and it ignores g.
    pub fn distance(&self, other: &Self) -> Result<f64> {
        if self.scope != other.scope {
            return Err(CalibraError::ScopeMismatch {
                inner: other.scope.id_list(),
                outer: self.scope.id_list(),
            });
        }
        if self.scope.is_empty() {
            return Ok(0.0);
        }
        let (a, b) = if linalg::is_positive_definite(self.precision.view())
            && linalg::is_positive_definite(other.precision.view())
        {
            let (mean_a, cov_a) = self.to_moment_form()?;
            let (mean_b, cov_b) = other.to_moment_form()?;
            ((mean_a, cov_a), (mean_b, cov_b))
        } else {
            (
                (self.scaled_mean.clone(), self.precision.clone()),
                (other.scaled_mean.clone(), other.precision.clone()),
            )
        };
        Ok(max_abs_diff(&a.0, &b.0).max(max_abs_diff(&a.1, &b.1)))
    }
}

fn max_abs_diff<D: ndarray::Dimension>(
    a: &ndarray::Array<f64, D>,
    b: &ndarray::Array<f64, D>,
) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0f64, |m, (x, y)| m.max((x - y).abs()))
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.slice(s![.., NewAxis]).dot(&b.slice(s![NewAxis, ..]))
}

impl Potential for GaussianFactor {
    fn scope(&self) -> &Scope {
        &self.scope
    }
    fn unit(scope: Scope) -> Result<Self> {
        GaussianFactor::unit(scope)
    }
    fn product(&self, other: &Self) -> Result<Self> {
        Ok(GaussianFactor::product(self, other))
    }
    fn marginal(&self, keep: &Scope) -> Result<Self> {
        GaussianFactor::marginal(self, keep)
    }
    fn division(&self, other: &Self) -> Result<Self> {
        GaussianFactor::division(self, other)
    }
    fn normalize(&self) -> Result<Self> {
        GaussianFactor::normalize(self)
    }
    fn distance(&self, other: &Self) -> Result<f64> {
        GaussianFactor::distance(self, other)
    }
    fn scaled(&self, log_factor: f64) -> Self {
        Self {
            log_normalizer: self.log_normalizer + log_factor,
            ..self.clone()
        }
    }
}
