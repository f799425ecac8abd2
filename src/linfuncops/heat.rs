use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::diffop::DiffOp;
use crate::error::{Error, Result};
use crate::linfuncops::LinearFunctionOperator;

/// Heat operator `f ↦ ∂f/∂t − α Δ_x f` on concatenated inputs `(t, x)`.
///
/// Coordinate 0 is time; the remaining `input_dim − 1` are space.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeatOperator {
    pub alpha: f64,
}

impl HeatOperator {
    pub fn new(alpha: f64) -> Self {
        HeatOperator { alpha }
    }
}

impl Default for HeatOperator {
    fn default() -> Self {
        HeatOperator { alpha: 1.0 }
    }
}

impl LinearFunctionOperator for HeatOperator {
    fn name(&self) -> &'static str {
        "HeatOperator"
    }

    fn diffop(&self, input_dim: usize) -> Result<DiffOp> {
        if input_dim < 2 {
            return Err(Error::InvalidArgument(format!(
                "heat operator needs time and space coordinates, got input dimension {input_dim}"
            )));
        }
        Ok(DiffOp::heat(input_dim, self.alpha))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Split a `(t, x)` point into time and space.
pub fn split_time_space(point: &[f64]) -> Result<(f64, &[f64])> {
    match point.split_first() {
        Some((t, x)) if !x.is_empty() => Ok((*t, x)),
        _ => Err(Error::InvalidArgument(format!(
            "expected a (t, x) point with at least one space coordinate, got {} values",
            point.len()
        ))),
    }
}

/// Inverse of [`split_time_space`].
pub fn join_time_space(t: f64, x: &[f64]) -> Vec<f64> {
    let mut point = Vec::with_capacity(x.len() + 1);
    point.push(t);
    point.extend_from_slice(x);
    point
}
