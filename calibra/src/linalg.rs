//! Dense symmetric positive-definite helpers for the Gaussian factors.
//!
//! Computations are delegated to nalgebra, conversions go through nshare.

use nalgebra::{Cholesky, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray1, IntoNdarray2};

use crate::{CalibraError, Result};

/// Cholesky decomposition of a symmetric matrix (only the lower triangle is read).
///
/// Fails with [`CalibraError::Singular`] if the matrix is not positive definite.
pub(crate) fn cholesky(a: ArrayView2<f64>, what: &'static str) -> Result<Cholesky<f64, Dyn>> {
    assert_eq!(a.nrows(), a.ncols());
    a.into_nalgebra()
        .cholesky()
        .ok_or(CalibraError::Singular(what))
}

pub(crate) fn is_positive_definite(a: ArrayView2<f64>) -> bool {
    a.nrows() == 0 || a.into_nalgebra().cholesky().is_some()
}

/// log(det(A)) from its Cholesky factor.
pub(crate) fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|x| x.ln()).sum::<f64>()
}

/// Inverse and log-determinant of a symmetric positive-definite matrix.
pub(crate) fn inverse_log_det(a: ArrayView2<f64>, what: &'static str) -> Result<(Array2<f64>, f64)> {
    if a.nrows() == 0 {
        return Ok((Array2::zeros((0, 0)), 0.0));
    }
    let chol = cholesky(a, what)?;
    let log_det = log_det(&chol);
    Ok((chol.inverse().into_ndarray2(), log_det))
}

/// Solves A x = b given the Cholesky factor of A.
pub(crate) fn solve(chol: &Cholesky<f64, Dyn>, b: ArrayView1<f64>) -> Array1<f64> {
    chol.solve(&b.into_nalgebra()).into_ndarray1()
}
