use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::diffop::constants;
use crate::error::{check_dim, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::Kernel;

/// Plain numeric kernel body.
pub type NumericKernelFn = dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync;
/// Differentiable kernel body.
pub type HyperKernelFn = dyn Fn(&[HyperDual], &[HyperDual]) -> HyperDual + Send + Sync;

/// Kernel wrapping a raw closure and its differentiable counterpart.
///
/// Both bodies are stored at construction. When only the differentiable body
/// is given, numeric evaluation lifts inputs to constants.
///
/// ```
/// use linpde_gp::kernels::{AdKernel, Kernel};
///
/// let k = AdKernel::from_hyper(1, |x0, x1| {
///     let d = &x0[0] - &x1[0];
///     (d.clone() * d * -0.5).exp()
/// });
/// assert!((k.evaluate(&[0.0], Some(&[1.0][..])).unwrap() - (-0.5f64).exp()).abs() < 1e-15);
/// ```
#[derive(Clone)]
pub struct AdKernel {
    input_dim: usize,
    numeric: Option<Arc<NumericKernelFn>>,
    hyper: Arc<HyperKernelFn>,
}

impl fmt::Debug for AdKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdKernel")
            .field("input_dim", &self.input_dim)
            .field("numeric", &self.numeric.is_some())
            .finish()
    }
}

impl AdKernel {
    pub fn new(
        input_dim: usize,
        numeric: impl Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
        hyper: impl Fn(&[HyperDual], &[HyperDual]) -> HyperDual + Send + Sync + 'static,
    ) -> Self {
        AdKernel {
            input_dim,
            numeric: Some(Arc::new(numeric)),
            hyper: Arc::new(hyper),
        }
    }

    pub fn from_hyper(
        input_dim: usize,
        hyper: impl Fn(&[HyperDual], &[HyperDual]) -> HyperDual + Send + Sync + 'static,
    ) -> Self {
        AdKernel {
            input_dim,
            numeric: None,
            hyper: Arc::new(hyper),
        }
    }
}

impl Kernel for AdKernel {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "AdKernel"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        let x1 = x1.unwrap_or(x0);
        match &self.numeric {
            Some(f) => Ok(f(x0, x1)),
            None => Ok((self.hyper)(&constants(x0), &constants(x1)).value()),
        }
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim, x0.len())?;
        check_dim(self.name(), self.input_dim, x1.len())?;
        Ok((self.hyper)(x0, x1))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
