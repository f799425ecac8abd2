use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{check_dim, Error, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::Kernel;
use crate::scalar::Scalar;

/// Squared-exponential kernel `σ² exp(−‖x0 − x1‖² / (2ℓ²))`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "ExpQuadFields")
)]
pub struct ExpQuad {
    input_dim: usize,
    lengthscale: f64,
    output_scale: f64,
}

/// Unvalidated wire form; deserialization goes through [`ExpQuad::new`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct ExpQuadFields {
    input_dim: usize,
    lengthscale: f64,
    output_scale: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<ExpQuadFields> for ExpQuad {
    type Error = Error;

    fn try_from(f: ExpQuadFields) -> Result<Self> {
        ExpQuad::new(f.input_dim, f.lengthscale, f.output_scale)
    }
}

impl ExpQuad {
    pub fn new(input_dim: usize, lengthscale: f64, output_scale: f64) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidArgument(
                "ExpQuad needs at least one input dimension".to_string(),
            ));
        }
        if lengthscale.is_nan() || lengthscale <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "ExpQuad lengthscale must be positive, got {lengthscale}"
            )));
        }
        Ok(ExpQuad {
            input_dim,
            lengthscale,
            output_scale,
        })
    }

    pub fn lengthscale(&self) -> f64 {
        self.lengthscale
    }

    pub fn output_scale(&self) -> f64 {
        self.output_scale
    }

    fn eval<T: Scalar>(&self, x0: &[T], x1: &[T]) -> T {
        let sqnorm: T = x0
            .iter()
            .zip(x1)
            .map(|(a, b)| {
                let d = a.clone() - b.clone();
                d.clone() * d
            })
            .sum();
        (sqnorm * (-0.5 / (self.lengthscale * self.lengthscale))).exp()
            * (self.output_scale * self.output_scale)
    }
}

impl Kernel for ExpQuad {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "ExpQuad"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        match x1 {
            Some(x1) => Ok(self.eval(x0, x1)),
            None => Ok(self.output_scale * self.output_scale),
        }
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim, x0.len())?;
        check_dim(self.name(), self.input_dim, x1.len())?;
        Ok(self.eval(x0, x1))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diagonal_is_output_variance() {
        let k = ExpQuad::new(2, 0.3, 2.0).unwrap();
        assert_relative_eq!(k.evaluate(&[0.1, 0.2], None).unwrap(), 4.0);
        assert_relative_eq!(
            k.evaluate(&[0.1, 0.2], Some(&[0.1, 0.2][..])).unwrap(),
            4.0
        );
    }

    #[test]
    fn rejects_wrong_dimension() {
        let k = ExpQuad::new(2, 0.3, 2.0).unwrap();
        let err = k.evaluate(&[0.1], None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 2, found: 1, .. }));
    }
}
