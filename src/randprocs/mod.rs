//! Random processes over `input_dim`-dimensional inputs.

use std::any::Any;
use std::fmt::Debug;

use nalgebra::{DMatrix, DVector};

use crate::error::Result;

pub mod deterministic;
pub mod gaussian;
pub mod parametric;
pub mod posterior;
pub mod randvars;

pub use deterministic::DeterministicProcess;
pub use gaussian::GaussianProcess;
pub use parametric::{FeatureFn, ParametricGaussianProcess};
pub use posterior::{ObservationBatch, PosteriorGaussianProcess, PosteriorKernel, PosteriorMean};
pub use randvars::{Normal, RandomVariable};

/// A scalar random process `f`, summarised by its first two moments.
pub trait RandomProcess: Debug + Send + Sync {
    fn input_dim(&self) -> usize;

    fn name(&self) -> &'static str;

    /// `E[f(x_i)]` per row.
    fn mean(&self, x: &DMatrix<f64>) -> Result<DVector<f64>>;

    /// `Cov[f(x0_i), f(x1_j)]`.
    fn cov(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>>;

    /// `Var[f(x_i)]` per row.
    fn var(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        Ok(self.cov(x, x)?.diagonal())
    }

    /// Joint distribution of `f` at the rows of `x`.
    fn marginal(&self, x: &DMatrix<f64>) -> Result<Normal> {
        Normal::new(self.mean(x)?, self.cov(x, x)?)
    }

    fn as_any(&self) -> &dyn Any;
}
