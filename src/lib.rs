//! Gaussian-process regression conditioned on linear differential operators.
//!
//! Kernels, mean functions and cross-covariances are transformed by
//! [`linfuncops::LinearFunctionOperator`]s through a dispatch registry:
//! closed-form specializations where they exist (product Matérn, `p = 3`),
//! otherwise exact automatic differentiation with [`HyperDual`] numbers.
//! [`randprocs::PosteriorGaussianProcess`] conditions on batches of
//! (operator-transformed) observations with a block Cholesky update.

pub mod api;
pub mod bases;
pub mod crosscov;
pub mod diffop;
pub mod domains;
pub mod error;
pub mod functions;
pub mod hyperdual;
pub mod kernels;
pub mod linfuncops;
pub mod nalgebra_support;
pub mod randprocs;
pub mod scalar;
mod traits;

pub use api::{derivative, directional_derivative, gradient, hessian, laplacian};
pub use diffop::{DiffOp, MultiIndex, PlanCache, SeedPlan};
pub use error::{Error, Result};
pub use hyperdual::HyperDual;
pub use scalar::Scalar;
