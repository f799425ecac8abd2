//! Cross-covariances between a scalar process `f` and a finite vector of
//! linear functionals `l = (l_1, …, l_n)` of it: `x ↦ Cov[f(x), l]`.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::diffop::{constants, max_bits, DiffOp, PlanCache};
use crate::error::{check_dim, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::{not_differentiable, Kernel};
use crate::nalgebra_support::{check_points, rows};

/// `x ↦ [Cov(f(x), l_j)]_j` for `n` functionals.
pub trait ProcessVectorCrossCovariance: Debug + Send + Sync {
    fn input_dim(&self) -> usize;

    /// Number of functionals.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> &'static str;

    /// Whether the process is the second covariance argument.
    fn reverse(&self) -> bool;

    /// Unchecked numeric evaluation at one point.
    fn eval_point(&self, x: &[f64]) -> Result<Vec<f64>>;

    /// Differentiable evaluation at one point.
    fn eval_hyper(&self, x: &[HyperDual]) -> Result<Vec<HyperDual>>;

    fn is_differentiable(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    /// `rows(x) × len` matrix.
    fn evaluate(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_points(self.name(), self.input_dim(), x)?;
        let n = self.len();
        let mut out = DMatrix::zeros(x.nrows(), n);
        for (i, p) in rows(x).iter().enumerate() {
            let values = self.eval_point(p)?;
            check_dim(self.name(), n, values.len())?;
            for (j, v) in values.into_iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        Ok(out)
    }
}

fn point_rows(points: &DMatrix<f64>) -> Vec<Vec<HyperDual>> {
    rows(points).iter().map(|p| constants(p)).collect()
}

/// `x ↦ [k(x, X_j)]_j`: point evaluations of the process at `X` on argument 1.
#[derive(Debug)]
pub struct KernelIdentityDirac {
    kernel: Arc<dyn Kernel>,
    points: DMatrix<f64>,
    hyper_points: Vec<Vec<HyperDual>>,
}

impl KernelIdentityDirac {
    pub fn new(kernel: Arc<dyn Kernel>, points: DMatrix<f64>) -> Result<Self> {
        check_points("KernelIdentityDirac points", kernel.input_dim(), &points)?;
        let hyper_points = point_rows(&points);
        Ok(KernelIdentityDirac {
            kernel,
            points,
            hyper_points,
        })
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }
}

impl ProcessVectorCrossCovariance for KernelIdentityDirac {
    fn input_dim(&self) -> usize {
        self.kernel.input_dim()
    }

    fn len(&self) -> usize {
        self.points.nrows()
    }

    fn name(&self) -> &'static str {
        "KernelIdentityDirac"
    }

    fn reverse(&self) -> bool {
        false
    }

    fn eval_point(&self, x: &[f64]) -> Result<Vec<f64>> {
        rows(&self.points)
            .iter()
            .map(|p| self.kernel.eval_point(x, Some(p.as_slice())))
            .collect()
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<Vec<HyperDual>> {
        self.hyper_points
            .iter()
            .map(|p| self.kernel.eval_hyper(x, p))
            .collect()
    }

    fn is_differentiable(&self) -> bool {
        self.kernel.is_differentiable()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `x ↦ [k(X_j, x)]_j`: point evaluations at `X` on argument 0.
#[derive(Debug)]
pub struct KernelDiracIdentity {
    kernel: Arc<dyn Kernel>,
    points: DMatrix<f64>,
    hyper_points: Vec<Vec<HyperDual>>,
}

impl KernelDiracIdentity {
    pub fn new(kernel: Arc<dyn Kernel>, points: DMatrix<f64>) -> Result<Self> {
        check_points("KernelDiracIdentity points", kernel.input_dim(), &points)?;
        let hyper_points = point_rows(&points);
        Ok(KernelDiracIdentity {
            kernel,
            points,
            hyper_points,
        })
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }
}

impl ProcessVectorCrossCovariance for KernelDiracIdentity {
    fn input_dim(&self) -> usize {
        self.kernel.input_dim()
    }

    fn len(&self) -> usize {
        self.points.nrows()
    }

    fn name(&self) -> &'static str {
        "KernelDiracIdentity"
    }

    fn reverse(&self) -> bool {
        true
    }

    fn eval_point(&self, x: &[f64]) -> Result<Vec<f64>> {
        rows(&self.points)
            .iter()
            .map(|p| self.kernel.eval_point(p, Some(x)))
            .collect()
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<Vec<HyperDual>> {
        self.hyper_points
            .iter()
            .map(|p| self.kernel.eval_hyper(p, x))
            .collect()
    }

    fn is_differentiable(&self) -> bool {
        self.kernel.is_differentiable()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `c · Cov(f(x), l)`.
#[derive(Debug)]
pub struct ScaledProcessVectorCrossCovariance {
    inner: Arc<dyn ProcessVectorCrossCovariance>,
    scalar: f64,
}

impl ScaledProcessVectorCrossCovariance {
    pub fn new(inner: Arc<dyn ProcessVectorCrossCovariance>, scalar: f64) -> Self {
        ScaledProcessVectorCrossCovariance { inner, scalar }
    }

    pub fn inner(&self) -> &Arc<dyn ProcessVectorCrossCovariance> {
        &self.inner
    }

    pub fn scalar(&self) -> f64 {
        self.scalar
    }
}

/// Scale a cross-covariance, folding nested scalings into one.
pub fn scale(
    cc: Arc<dyn ProcessVectorCrossCovariance>,
    scalar: f64,
) -> Arc<dyn ProcessVectorCrossCovariance> {
    if let Some(scaled) = cc.as_any().downcast_ref::<ScaledProcessVectorCrossCovariance>() {
        return Arc::new(ScaledProcessVectorCrossCovariance::new(
            Arc::clone(&scaled.inner),
            scaled.scalar * scalar,
        ));
    }
    Arc::new(ScaledProcessVectorCrossCovariance::new(cc, scalar))
}

impl ProcessVectorCrossCovariance for ScaledProcessVectorCrossCovariance {
    fn input_dim(&self) -> usize {
        self.inner.input_dim()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn name(&self) -> &'static str {
        "ScaledProcessVectorCrossCovariance"
    }

    fn reverse(&self) -> bool {
        self.inner.reverse()
    }

    fn eval_point(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(self
            .inner
            .eval_point(x)?
            .into_iter()
            .map(|v| v * self.scalar)
            .collect())
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<Vec<HyperDual>> {
        Ok(self
            .inner
            .eval_hyper(x)?
            .into_iter()
            .map(|v| v * self.scalar)
            .collect())
    }

    fn is_differentiable(&self) -> bool {
        self.inner.is_differentiable()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `L` applied to the process argument by automatic differentiation.
#[derive(Debug)]
pub struct TransformedCrossCovariance {
    parent: Arc<dyn ProcessVectorCrossCovariance>,
    operator: String,
    plans: PlanCache,
}

impl TransformedCrossCovariance {
    pub fn new(
        parent: Arc<dyn ProcessVectorCrossCovariance>,
        operator: impl Into<String>,
        op: DiffOp,
    ) -> Result<Self> {
        check_dim(
            "TransformedCrossCovariance operator",
            parent.input_dim(),
            op.num_vars(),
        )?;
        if !parent.is_differentiable() {
            return Err(not_differentiable(parent.name()));
        }
        Ok(TransformedCrossCovariance {
            parent,
            operator: operator.into(),
            plans: PlanCache::new(op),
        })
    }

    pub fn parent(&self) -> &Arc<dyn ProcessVectorCrossCovariance> {
        &self.parent
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }
}

impl ProcessVectorCrossCovariance for TransformedCrossCovariance {
    fn input_dim(&self) -> usize {
        self.parent.input_dim()
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn name(&self) -> &'static str {
        "TransformedCrossCovariance"
    }

    fn reverse(&self) -> bool {
        self.parent.reverse()
    }

    fn eval_point(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(self
            .eval_hyper(&constants(x))?
            .iter()
            .map(HyperDual::value)
            .collect())
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<Vec<HyperDual>> {
        check_dim(self.name(), self.input_dim(), x.len())?;
        self.plans
            .try_apply_many(max_bits([x]), x, self.len(), |xs| self.parent.eval_hyper(xs))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
