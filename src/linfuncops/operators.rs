use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::diffop::DiffOp;
use crate::error::{check_dim, Result};
use crate::linfuncops::LinearFunctionOperator;

/// `f ↦ f`. Dispatch returns the target unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Identity;

impl LinearFunctionOperator for Identity {
    fn name(&self) -> &'static str {
        "Identity"
    }

    fn diffop(&self, input_dim: usize) -> Result<DiffOp> {
        Ok(DiffOp::identity(input_dim))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `f ↦ ⟨v, ∇f⟩`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectionalDerivative {
    direction: Vec<f64>,
}

impl DirectionalDerivative {
    pub fn new(direction: Vec<f64>) -> Self {
        DirectionalDerivative { direction }
    }

    pub fn direction(&self) -> &[f64] {
        &self.direction
    }
}

impl LinearFunctionOperator for DirectionalDerivative {
    fn name(&self) -> &'static str {
        "DirectionalDerivative"
    }

    fn diffop(&self, input_dim: usize) -> Result<DiffOp> {
        check_dim("DirectionalDerivative direction", input_dim, self.direction.len())?;
        Ok(DiffOp::directional_derivative(&self.direction))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `f ↦ Σ_i ∂²f/∂x_i²`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Laplacian;

impl LinearFunctionOperator for Laplacian {
    fn name(&self) -> &'static str {
        "Laplacian"
    }

    fn diffop(&self, input_dim: usize) -> Result<DiffOp> {
        Ok(DiffOp::laplacian(input_dim))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `f ↦ α Δf`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScaledLaplacian {
    pub alpha: f64,
}

impl ScaledLaplacian {
    pub fn new(alpha: f64) -> Self {
        ScaledLaplacian { alpha }
    }
}

impl Default for ScaledLaplacian {
    fn default() -> Self {
        ScaledLaplacian { alpha: 1.0 }
    }
}

impl LinearFunctionOperator for ScaledLaplacian {
    fn name(&self) -> &'static str {
        "ScaledLaplacian"
    }

    fn diffop(&self, input_dim: usize) -> Result<DiffOp> {
        Ok(DiffOp::scaled_laplacian(input_dim, self.alpha))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
