//! Covariance kernels.
//!
//! Every kernel has a numeric evaluation and a differentiable
//! ([`HyperDual`]) evaluation. Operators with a closed-form specialization
//! produce dedicated kernel types (see [`matern_laplacian`]); all others
//! produce a [`TransformedKernel`] that differentiates the parent's
//! differentiable evaluation.

use std::any::Any;
use std::fmt::Debug;

use nalgebra::{DMatrix, DVector};

use crate::error::{check_dim, Error, Result};
use crate::hyperdual::HyperDual;
use crate::nalgebra_support::{check_points, rows};

pub mod ad;
pub mod expquad;
pub mod matern;
pub mod matern_directional;
pub mod matern_laplacian;
pub mod transformed;

pub use ad::AdKernel;
pub use expquad::ExpQuad;
pub use matern::ProductMatern;
pub use matern_directional::ProductMaternIdentityDirectionalDerivative;
pub use matern_laplacian::{
    ProductMaternDirectionalDerivativeLaplacian, ProductMaternIdentityLaplacian,
    ProductMaternLaplacianLaplacian,
};
pub use transformed::TransformedKernel;

/// A scalar covariance function `k(x0, x1)` on `input_dim`-dimensional points.
///
/// Implementors provide the unchecked `eval_point` / `eval_hyper`; callers use
/// the checked `evaluate`, `matrix`, `diagonal` and `paired`.
pub trait Kernel: Debug + Send + Sync {
    /// Dimension of each input point.
    fn input_dim(&self) -> usize;

    /// Short type name used in dispatch logs and errors.
    fn name(&self) -> &'static str;

    /// Numeric evaluation. `x1 = None` is the self-covariance `k(x0, x0)`.
    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64>;

    /// Differentiable evaluation.
    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual>;

    /// Whether `eval_hyper` is available.
    fn is_differentiable(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    /// Checked point evaluation.
    fn evaluate(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        check_dim(self.name(), self.input_dim(), x0.len())?;
        if let Some(x1) = x1 {
            check_dim(self.name(), self.input_dim(), x1.len())?;
        }
        self.eval_point(x0, x1)
    }

    /// Pairwise Gram matrix `K[i, j] = k(x0_i, x1_j)`.
    fn matrix(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_points(self.name(), self.input_dim(), x0)?;
        check_points(self.name(), self.input_dim(), x1)?;
        let r0 = rows(x0);
        let r1 = rows(x1);
        let mut out = DMatrix::zeros(r0.len(), r1.len());
        for (i, a) in r0.iter().enumerate() {
            for (j, b) in r1.iter().enumerate() {
                out[(i, j)] = self.eval_point(a, Some(b.as_slice()))?;
            }
        }
        Ok(out)
    }

    /// Self-covariances `k(x_i, x_i)`, without pairwise broadcasting.
    fn diagonal(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        check_points(self.name(), self.input_dim(), x)?;
        let values = rows(x)
            .iter()
            .map(|a| self.eval_point(a, None))
            .collect::<Result<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }

    /// Row-wise evaluation `k(x0_i, x1_i)`.
    fn paired(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DVector<f64>> {
        check_points(self.name(), self.input_dim(), x0)?;
        check_points(self.name(), self.input_dim(), x1)?;
        if x0.nrows() != x1.nrows() {
            return Err(Error::ShapeMismatch {
                context: format!("{} paired batch", self.name()),
                expected: x0.nrows(),
                found: x1.nrows(),
            });
        }
        let values = rows(x0)
            .iter()
            .zip(rows(x1).iter())
            .map(|(a, b)| self.eval_point(a, Some(b.as_slice())))
            .collect::<Result<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }
}

/// Error for kernels without a differentiable representation.
pub(crate) fn not_differentiable(target: &'static str) -> Error {
    Error::NotImplemented {
        operator: "automatic differentiation".to_string(),
        target,
    }
}
