use std::any::Any;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::error::{check_dim, Result};
use crate::functions::{Function, ZeroFunction};
use crate::kernels::Kernel;
use crate::linfuncops::{apply_to_function, apply_to_kernel, LinearFunctionOperator};
use crate::randprocs::{Normal, PosteriorGaussianProcess, RandomProcess};

/// Gaussian process with a mean function and a covariance kernel.
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    mean: Arc<dyn Function>,
    cov: Arc<dyn Kernel>,
}

impl GaussianProcess {
    pub fn new(mean: Arc<dyn Function>, cov: Arc<dyn Kernel>) -> Result<Self> {
        check_dim("GaussianProcess mean", cov.input_dim(), mean.input_dim())?;
        Ok(GaussianProcess { mean, cov })
    }

    /// Zero-mean process.
    pub fn centered(cov: Arc<dyn Kernel>) -> Self {
        GaussianProcess {
            mean: Arc::new(ZeroFunction::new(cov.input_dim())),
            cov,
        }
    }

    pub fn mean_function(&self) -> &Arc<dyn Function> {
        &self.mean
    }

    pub fn cov_kernel(&self) -> &Arc<dyn Kernel> {
        &self.cov
    }

    /// `L f ~ GP(L m, L k L')`.
    pub fn apply_operator(&self, op: &dyn LinearFunctionOperator) -> Result<GaussianProcess> {
        let mean = apply_to_function(op, Arc::clone(&self.mean))?;
        let cov = apply_to_kernel(op, apply_to_kernel(op, Arc::clone(&self.cov), 1)?, 0)?;
        Ok(GaussianProcess { mean, cov })
    }

    /// Condition on `L f(X) + ε = Y`.
    ///
    /// `op = None` observes `f` itself; `noise = None` is exact observation.
    /// Returns a new process and leaves `self` untouched.
    pub fn condition_on_observations(
        &self,
        x: DMatrix<f64>,
        y: DVector<f64>,
        noise: Option<Normal>,
        op: Option<Arc<dyn LinearFunctionOperator>>,
    ) -> Result<PosteriorGaussianProcess> {
        PosteriorGaussianProcess::from_prior(self.clone()).condition_on_observations(x, y, noise, op)
    }
}

impl RandomProcess for GaussianProcess {
    fn input_dim(&self) -> usize {
        self.cov.input_dim()
    }

    fn name(&self) -> &'static str {
        "GaussianProcess"
    }

    fn mean(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.mean.evaluate_batch(x)
    }

    fn cov(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.cov.matrix(x0, x1)
    }

    fn var(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.cov.diagonal(x)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
