//! Finite-dimensional random variables.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Multivariate normal `N(mean, cov)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Normal {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
}

impl Normal {
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        if cov.nrows() != mean.len() || cov.ncols() != mean.len() {
            return Err(Error::InvalidArgument(format!(
                "normal covariance is {}x{} for a mean of size {}",
                cov.nrows(),
                cov.ncols(),
                mean.len()
            )));
        }
        Ok(Normal { mean, cov })
    }

    /// `N(mean, σ² I)`.
    pub fn isotropic(mean: DVector<f64>, variance: f64) -> Self {
        let n = mean.len();
        Normal {
            mean,
            cov: DMatrix::identity(n, n) * variance,
        }
    }

    /// `N(0, 0)` of size `n`.
    pub fn zeros(n: usize) -> Self {
        Normal {
            mean: DVector::zeros(n),
            cov: DMatrix::zeros(n, n),
        }
    }

    pub fn size(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    pub fn var(&self) -> DVector<f64> {
        self.cov.diagonal()
    }

    pub fn std(&self) -> DVector<f64> {
        self.var().map(|v| v.max(0.0).sqrt())
    }
}

/// Random coefficient vectors understood by the crate.
#[derive(Clone, Debug, PartialEq)]
pub enum RandomVariable {
    /// Point mass.
    Constant(DVector<f64>),
    Normal(Normal),
    /// Independent uniforms on `[lower_i, upper_i]`.
    Uniform {
        lower: DVector<f64>,
        upper: DVector<f64>,
    },
}

impl RandomVariable {
    pub fn kind(&self) -> &'static str {
        match self {
            RandomVariable::Constant(_) => "Constant",
            RandomVariable::Normal(_) => "Normal",
            RandomVariable::Uniform { .. } => "Uniform",
        }
    }

    pub fn size(&self) -> usize {
        match self {
            RandomVariable::Constant(v) => v.len(),
            RandomVariable::Normal(n) => n.size(),
            RandomVariable::Uniform { lower, .. } => lower.len(),
        }
    }

    pub fn mean(&self) -> DVector<f64> {
        match self {
            RandomVariable::Constant(v) => v.clone(),
            RandomVariable::Normal(n) => n.mean().clone(),
            RandomVariable::Uniform { lower, upper } => (lower + upper) * 0.5,
        }
    }
}

impl From<Normal> for RandomVariable {
    fn from(n: Normal) -> Self {
        RandomVariable::Normal(n)
    }
}
