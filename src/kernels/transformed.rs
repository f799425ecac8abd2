use std::any::Any;
use std::sync::Arc;

use crate::diffop::{constants, max_bits, DiffOp, PlanCache};
use crate::error::{check_argnum, check_dim, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::{not_differentiable, Kernel};

/// `L k` with `L` applied to argument `argnum` by automatic differentiation
/// of the parent's differentiable evaluation.
///
/// Fresh perturbation symbols are allocated above those carried by either
/// argument, so a `TransformedKernel` can itself be the parent of another.
#[derive(Debug)]
pub struct TransformedKernel {
    parent: Arc<dyn Kernel>,
    operator: String,
    argnum: usize,
    plans: PlanCache,
}

impl TransformedKernel {
    pub fn new(
        parent: Arc<dyn Kernel>,
        operator: impl Into<String>,
        op: DiffOp,
        argnum: usize,
    ) -> Result<Self> {
        check_argnum(argnum)?;
        check_dim("TransformedKernel operator", parent.input_dim(), op.num_vars())?;
        if !parent.is_differentiable() {
            return Err(not_differentiable(parent.name()));
        }
        Ok(TransformedKernel {
            parent,
            operator: operator.into(),
            argnum,
            plans: PlanCache::new(op),
        })
    }

    pub fn parent(&self) -> &Arc<dyn Kernel> {
        &self.parent
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn diffop(&self) -> &DiffOp {
        self.plans.op()
    }

    pub fn argnum(&self) -> usize {
        self.argnum
    }

    /// Distinct call signatures compiled so far.
    pub fn cached_signatures(&self) -> usize {
        self.plans.cached_signatures()
    }
}

impl Kernel for TransformedKernel {
    fn input_dim(&self) -> usize {
        self.parent.input_dim()
    }

    fn name(&self) -> &'static str {
        "TransformedKernel"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        let x1 = x1.unwrap_or(x0);
        Ok(self.eval_hyper(&constants(x0), &constants(x1))?.value())
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim(), x0.len())?;
        check_dim(self.name(), self.input_dim(), x1.len())?;
        let base = max_bits([x0, x1]);
        if self.argnum == 0 {
            self.plans
                .try_apply(base, x0, |xs| self.parent.eval_hyper(xs, x1))
        } else {
            self.plans
                .try_apply(base, x1, |xs| self.parent.eval_hyper(x0, xs))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
