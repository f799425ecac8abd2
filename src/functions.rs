//! Scalar functions on `input_dim`-dimensional points: prior means, basis
//! functions and their images under linear operators.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::diffop::{constants, max_bits, DiffOp, PlanCache};
use crate::error::{check_dim, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::not_differentiable;
use crate::nalgebra_support::{check_points, rows};

/// A scalar function `f(x)`.
pub trait Function: Debug + Send + Sync {
    fn input_dim(&self) -> usize;

    fn name(&self) -> &'static str;

    /// Unchecked numeric evaluation.
    fn eval_point(&self, x: &[f64]) -> Result<f64>;

    /// Differentiable evaluation.
    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual>;

    fn is_differentiable(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        check_dim(self.name(), self.input_dim(), x.len())?;
        self.eval_point(x)
    }

    /// One value per row of `x`.
    fn evaluate_batch(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        check_points(self.name(), self.input_dim(), x)?;
        let values = rows(x)
            .iter()
            .map(|p| self.eval_point(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }
}

pub type NumericFn = dyn Fn(&[f64]) -> f64 + Send + Sync;
pub type HyperFn = dyn Fn(&[HyperDual]) -> HyperDual + Send + Sync;

/// Function wrapping a closure and its differentiable counterpart.
#[derive(Clone)]
pub struct AdFunction {
    input_dim: usize,
    numeric: Option<Arc<NumericFn>>,
    hyper: Arc<HyperFn>,
}

impl Debug for AdFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdFunction")
            .field("input_dim", &self.input_dim)
            .field("numeric", &self.numeric.is_some())
            .finish()
    }
}

impl AdFunction {
    pub fn new(
        input_dim: usize,
        numeric: impl Fn(&[f64]) -> f64 + Send + Sync + 'static,
        hyper: impl Fn(&[HyperDual]) -> HyperDual + Send + Sync + 'static,
    ) -> Self {
        AdFunction {
            input_dim,
            numeric: Some(Arc::new(numeric)),
            hyper: Arc::new(hyper),
        }
    }

    pub fn from_hyper(
        input_dim: usize,
        hyper: impl Fn(&[HyperDual]) -> HyperDual + Send + Sync + 'static,
    ) -> Self {
        AdFunction {
            input_dim,
            numeric: None,
            hyper: Arc::new(hyper),
        }
    }
}

impl Function for AdFunction {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "AdFunction"
    }

    fn eval_point(&self, x: &[f64]) -> Result<f64> {
        match &self.numeric {
            Some(f) => Ok(f(x)),
            None => Ok((self.hyper)(&constants(x)).value()),
        }
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim, x.len())?;
        Ok((self.hyper)(x))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ZeroFunction {
    input_dim: usize,
}

impl ZeroFunction {
    pub fn new(input_dim: usize) -> Self {
        ZeroFunction { input_dim }
    }
}

impl Function for ZeroFunction {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "ZeroFunction"
    }

    fn eval_point(&self, _x: &[f64]) -> Result<f64> {
        Ok(0.0)
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim, x.len())?;
        Ok(HyperDual::constant(0.0).lift(max_bits([x])))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstantFunction {
    input_dim: usize,
    value: f64,
}

impl ConstantFunction {
    pub fn new(input_dim: usize, value: f64) -> Self {
        ConstantFunction { input_dim, value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Function for ConstantFunction {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "ConstantFunction"
    }

    fn eval_point(&self, _x: &[f64]) -> Result<f64> {
        Ok(self.value)
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim, x.len())?;
        Ok(HyperDual::constant(self.value).lift(max_bits([x])))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Numeric-only function. Operators other than the identity cannot be
/// applied to it.
#[derive(Clone)]
pub struct LambdaFunction {
    input_dim: usize,
    f: Arc<NumericFn>,
}

impl Debug for LambdaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaFunction")
            .field("input_dim", &self.input_dim)
            .finish()
    }
}

impl LambdaFunction {
    pub fn new(input_dim: usize, f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        LambdaFunction {
            input_dim,
            f: Arc::new(f),
        }
    }
}

impl Function for LambdaFunction {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn name(&self) -> &'static str {
        "LambdaFunction"
    }

    fn eval_point(&self, x: &[f64]) -> Result<f64> {
        Ok((self.f)(x))
    }

    fn eval_hyper(&self, _x: &[HyperDual]) -> Result<HyperDual> {
        Err(not_differentiable(self.name()))
    }

    fn is_differentiable(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `L f` by automatic differentiation of the parent.
#[derive(Debug)]
pub struct TransformedFunction {
    parent: Arc<dyn Function>,
    operator: String,
    plans: PlanCache,
}

impl TransformedFunction {
    pub fn new(parent: Arc<dyn Function>, operator: impl Into<String>, op: DiffOp) -> Result<Self> {
        check_dim("TransformedFunction operator", parent.input_dim(), op.num_vars())?;
        if !parent.is_differentiable() {
            return Err(not_differentiable(parent.name()));
        }
        Ok(TransformedFunction {
            parent,
            operator: operator.into(),
            plans: PlanCache::new(op),
        })
    }

    pub fn parent(&self) -> &Arc<dyn Function> {
        &self.parent
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn diffop(&self) -> &DiffOp {
        self.plans.op()
    }
}

impl Function for TransformedFunction {
    fn input_dim(&self) -> usize {
        self.parent.input_dim()
    }

    fn name(&self) -> &'static str {
        "TransformedFunction"
    }

    fn eval_point(&self, x: &[f64]) -> Result<f64> {
        Ok(self.eval_hyper(&constants(x))?.value())
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim(), x.len())?;
        self.plans
            .try_apply(max_bits([x]), x, |xs| self.parent.eval_hyper(xs))
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
    fn laplacian_of_quadratic() {
        let f: Arc<dyn Function> = Arc::new(AdFunction::from_hyper(2, |x| {
            x[0].clone() * x[0].clone() * 3.0 + x[1].clone() * x[1].clone()
        }));
        let lf = TransformedFunction::new(f, "Laplacian", DiffOp::laplacian(2)).unwrap();
        assert_relative_eq!(lf.evaluate(&[0.3, -1.2]).unwrap(), 8.0, max_relative = 1e-14);
    }

    #[test]
    fn lambda_is_not_differentiable() {
        let f: Arc<dyn Function> = Arc::new(LambdaFunction::new(1, |x| x[0].abs()));
        assert!(TransformedFunction::new(f, "Laplacian", DiffOp::laplacian(1)).is_err());
    }

    #[test]
    fn batch_evaluation_checks_columns() {
        let f = ConstantFunction::new(2, 1.5);
        let x = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(f.evaluate_batch(&x).unwrap(), DVector::from_vec(vec![1.5, 1.5]));
        assert!(f.evaluate_batch(&DMatrix::zeros(2, 3)).is_err());
    }
}
