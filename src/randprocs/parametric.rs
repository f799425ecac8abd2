use std::any::Any;
use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::error::{check_dim, Result};
use crate::randprocs::{Normal, RandomProcess};

/// Feature map `X ↦ Φ(X)`, one row of features per row of `X`.
pub type FeatureFn = dyn Fn(&DMatrix<f64>) -> Result<DMatrix<f64>> + Send + Sync;

/// `f(x) = φ(x)ᵀ w` with Gaussian weights `w ~ N(μ, Σ)`.
///
/// Moments are `E f(X) = Φ(X) μ` and `Cov[f(X0), f(X1)] = Φ(X0) Σ Φ(X1)ᵀ`.
#[derive(Clone)]
pub struct ParametricGaussianProcess {
    input_dim: usize,
    weights: Normal,
    features: Arc<FeatureFn>,
}

impl fmt::Debug for ParametricGaussianProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParametricGaussianProcess")
            .field("input_dim", &self.input_dim)
            .field("weights", &self.weights)
            .finish()
    }
}

impl ParametricGaussianProcess {
    pub fn new(
        input_dim: usize,
        weights: Normal,
        features: impl Fn(&DMatrix<f64>) -> Result<DMatrix<f64>> + Send + Sync + 'static,
    ) -> Self {
        ParametricGaussianProcess {
            input_dim,
            weights,
            features: Arc::new(features),
        }
    }

    pub fn weights(&self) -> &Normal {
        &self.weights
    }

    /// `Φ(X)`, checked against the weight count.
    pub fn features(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let phi = (self.features)(x)?;
        check_dim("ParametricGaussianProcess features", self.weights.size(), phi.ncols())?;
        check_dim("ParametricGaussianProcess feature rows", x.nrows(), phi.nrows())?;
        Ok(phi)
    }
}

impl RandomProcess for ParametricGaussianProcess {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "ParametricGaussianProcess"
    }

    fn mean(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        Ok(self.features(x)? * self.weights.mean())
    }

    fn cov(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let phi0 = self.features(x0)?;
        let phi1 = self.features(x1)?;
        Ok(phi0 * self.weights.cov() * phi1.transpose())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
