//! Linear function operators and their application to functions, kernels,
//! cross-covariances and Gaussian processes.
//!
//! Every operator knows its [`DiffOp`] representation, which drives the
//! automatic-differentiation fallback. Closed-form results for particular
//! operator × target pairs are looked up in the [`dispatch`] registry first.

use std::any::Any;
use std::fmt::Debug;

use crate::diffop::DiffOp;
use crate::error::Result;
use crate::randprocs::{GaussianProcess, PosteriorGaussianProcess};

pub mod dispatch;
pub mod heat;
pub mod operators;

pub use dispatch::{
    apply_to_crosscov, apply_to_function, apply_to_kernel, register_any_operator_crosscov_rule,
    register_any_operator_function_rule, register_any_operator_kernel_rule,
    register_crosscov_rule, register_function_rule, register_kernel_rule,
};
pub use heat::{join_time_space, split_time_space, HeatOperator};
pub use operators::{DirectionalDerivative, Identity, Laplacian, ScaledLaplacian};

/// A linear operator on scalar functions of `input_dim` variables.
pub trait LinearFunctionOperator: Debug + Send + Sync {
    /// Short name used in dispatch logs and errors.
    fn name(&self) -> &'static str;

    /// Differential-operator representation on `input_dim` variables.
    fn diffop(&self, input_dim: usize) -> Result<DiffOp>;

    fn as_any(&self) -> &dyn Any;
}

/// `L f` for a Gaussian process: the mean is transformed and the covariance
/// on both arguments.
pub fn apply_to_process(
    op: &dyn LinearFunctionOperator,
    gp: &GaussianProcess,
) -> Result<GaussianProcess> {
    gp.apply_operator(op)
}

/// `L f` for a posterior process, reusing its Cholesky factor and
/// representer weights.
pub fn apply_to_posterior(
    op: &dyn LinearFunctionOperator,
    post: &PosteriorGaussianProcess,
) -> Result<PosteriorGaussianProcess> {
    post.apply_operator(op)
}
