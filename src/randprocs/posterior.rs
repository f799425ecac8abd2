//! Posterior Gaussian processes under incremental conditioning.
//!
//! Observations arrive in batches `Y_i = L_i f(X_i) + ε_i`. The joint Gram
//! matrix of all observed functionals is never refactorized: each batch
//! appends one block row to its lower Cholesky factor,
//!
//! ```text
//! L_new = [ L     0  ]     B = L⁻¹ K_{<i,i}
//!         [ Bᵀ    C  ]     C Cᵀ = K_{ii} + Σ_i − Bᵀ B
//! ```
//!
//! together with the whitened residual `z_i = C⁻¹ (y_i − m_i − Bᵀ z_{<i})`.
//! Factorization cost per batch is `O(b_i³)` plus the cross terms. The
//! representer weights are `α = L⁻ᵀ z`; the posterior moments are
//!
//! ```text
//! m*(x)      = m(x) + k(x, l) α
//! k*(x0, x1) = k(x0, x1) − v(x0)ᵀ v(x1),   v(x) = L⁻¹ k(l, x)
//! ```
//!
//! where `k(x, l)` stacks the prior cross-covariances of every batch.

use std::any::Any;
use std::sync::Arc;

use nalgebra::{Cholesky, DMatrix, DVector};
use tracing::debug;

use crate::crosscov::{KernelIdentityDirac, ProcessVectorCrossCovariance};
use crate::diffop::max_bits;
use crate::error::{check_dim, Error, Result};
use crate::functions::Function;
use crate::hyperdual::HyperDual;
use crate::kernels::Kernel;
use crate::linfuncops::{
    apply_to_crosscov, apply_to_function, apply_to_kernel, Identity, LinearFunctionOperator,
};
use crate::nalgebra_support::{check_points, concat_vectors};
use crate::randprocs::{GaussianProcess, Normal, RandomProcess};

/// One conditioning step: the observed functionals and their block of the
/// joint Cholesky factor.
#[derive(Clone, Debug)]
pub struct ObservationBatch {
    points: DMatrix<f64>,
    values: DVector<f64>,
    operator: Option<Arc<dyn LinearFunctionOperator>>,
    noise: Option<Normal>,
    /// `x ↦ Cov(f(x), l_i)` under the prior.
    crosscov: Arc<dyn ProcessVectorCrossCovariance>,
    cross_block: DMatrix<f64>,
    cholesky: DMatrix<f64>,
    whitened: DVector<f64>,
}

impl ObservationBatch {
    pub fn size(&self) -> usize {
        self.points.nrows()
    }

    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn operator(&self) -> Option<&Arc<dyn LinearFunctionOperator>> {
        self.operator.as_ref()
    }

    pub fn noise(&self) -> Option<&Normal> {
        self.noise.as_ref()
    }

    pub fn crosscov(&self) -> &Arc<dyn ProcessVectorCrossCovariance> {
        &self.crosscov
    }

    /// `B_i = L⁻¹ K_{<i,i}`.
    pub fn cross_block(&self) -> &DMatrix<f64> {
        &self.cross_block
    }

    /// Lower Cholesky factor of the batch's Schur complement.
    pub fn cholesky(&self) -> &DMatrix<f64> {
        &self.cholesky
    }

    pub fn whitened(&self) -> &DVector<f64> {
        &self.whitened
    }
}

/// A prior Gaussian process conditioned on a sequence of observation batches.
///
/// Conditioning is pure: [`condition_on_observations`] returns a new process
/// and leaves the receiver usable.
///
/// [`condition_on_observations`]: PosteriorGaussianProcess::condition_on_observations
#[derive(Clone, Debug)]
pub struct PosteriorGaussianProcess {
    prior: GaussianProcess,
    batches: Vec<ObservationBatch>,
    factor: Arc<DMatrix<f64>>,
    whitened: DVector<f64>,
    representer_weights: Arc<DVector<f64>>,
}

impl PosteriorGaussianProcess {
    /// The prior itself, with no observations.
    pub fn from_prior(prior: GaussianProcess) -> Self {
        PosteriorGaussianProcess {
            prior,
            batches: Vec::new(),
            factor: Arc::new(DMatrix::zeros(0, 0)),
            whitened: DVector::zeros(0),
            representer_weights: Arc::new(DVector::zeros(0)),
        }
    }

    pub fn prior(&self) -> &GaussianProcess {
        &self.prior
    }

    pub fn batches(&self) -> &[ObservationBatch] {
        &self.batches
    }

    pub fn num_observations(&self) -> usize {
        self.batches.iter().map(ObservationBatch::size).sum()
    }

    /// Lower Cholesky factor of the joint predictive Gram matrix.
    pub fn factor(&self) -> &DMatrix<f64> {
        &self.factor
    }

    pub fn representer_weights(&self) -> &DVector<f64> {
        &self.representer_weights
    }

    /// Condition additionally on `L f(X) + ε = Y`.
    ///
    /// `op = None` observes `f` itself; `noise = None` is exact observation.
    pub fn condition_on_observations(
        &self,
        x: DMatrix<f64>,
        y: DVector<f64>,
        noise: Option<Normal>,
        op: Option<Arc<dyn LinearFunctionOperator>>,
    ) -> Result<Self> {
        let batch = self.batches.len();
        let size = x.nrows();
        check_points("observation points", self.prior.input_dim(), &x)?;
        if size == 0 {
            return Err(Error::InvalidArgument("empty observation batch".to_string()));
        }
        if y.len() != size {
            return Err(Error::InvalidArgument(format!(
                "{} observed values for {} points",
                y.len(),
                size
            )));
        }
        if let Some(n) = &noise {
            if n.size() != size {
                return Err(Error::InvalidArgument(format!(
                    "noise of size {} for {} points",
                    n.size(),
                    size
                )));
            }
        }

        let observe: &dyn LinearFunctionOperator = op.as_deref().unwrap_or(&Identity);
        let crosscov_kernel = apply_to_kernel(observe, Arc::clone(self.prior.cov_kernel()), 1)?;
        let gram = apply_to_kernel(observe, Arc::clone(&crosscov_kernel), 0)?.matrix(&x, &x)?;
        let crosscov: Arc<dyn ProcessVectorCrossCovariance> =
            Arc::new(KernelIdentityDirac::new(crosscov_kernel, x.clone())?);
        let pred_mean =
            apply_to_function(observe, Arc::clone(self.prior.mean_function()))?.evaluate_batch(&x)?;

        let n = self.num_observations();
        let mut cross = DMatrix::zeros(n, size);
        let mut offset = 0;
        for old in &self.batches {
            let block = apply_to_crosscov(observe, Arc::clone(&old.crosscov))?.evaluate(&x)?;
            cross
                .view_mut((offset, 0), (old.size(), size))
                .copy_from(&block.transpose());
            offset += old.size();
        }
        let cross_block = if n == 0 {
            DMatrix::zeros(0, size)
        } else {
            solve_lower(&self.factor, &cross, batch)?
        };

        let (noise_mean, noise_cov) = match &noise {
            Some(n) => (n.mean().clone(), n.cov().clone()),
            None => (DVector::zeros(size), DMatrix::zeros(size, size)),
        };
        let schur = gram + noise_cov - cross_block.transpose() * &cross_block;
        let cholesky = Cholesky::new(schur)
            .ok_or(Error::NotPositiveDefinite { batch, size })?
            .l();
        let residual = &y - pred_mean - noise_mean - cross_block.transpose() * &self.whitened;
        let batch_whitened = cholesky
            .solve_lower_triangular(&residual)
            .ok_or(Error::NotPositiveDefinite { batch, size })?;

        let total = n + size;
        let mut factor = DMatrix::zeros(total, total);
        factor.view_mut((0, 0), (n, n)).copy_from(&*self.factor);
        factor
            .view_mut((n, 0), (size, n))
            .copy_from(&cross_block.transpose());
        factor.view_mut((n, n), (size, size)).copy_from(&cholesky);
        let whitened = concat_vectors(&[self.whitened.clone(), batch_whitened.clone()]);
        let representer_weights = factor
            .tr_solve_lower_triangular(&whitened)
            .ok_or(Error::NotPositiveDefinite { batch, size })?;

        debug!(batch, size, total, "conditioned on observation batch");

        let mut batches = self.batches.clone();
        batches.push(ObservationBatch {
            points: x,
            values: y,
            operator: op,
            noise,
            crosscov,
            cross_block,
            cholesky,
            whitened: batch_whitened,
        });
        Ok(PosteriorGaussianProcess {
            prior: self.prior.clone(),
            batches,
            factor: Arc::new(factor),
            whitened,
            representer_weights: Arc::new(representer_weights),
        })
    }

    /// `L f` given the same observations. The prior moments and every stored
    /// cross-covariance are transformed; the factor and weights are shared.
    pub fn apply_operator(&self, op: &dyn LinearFunctionOperator) -> Result<Self> {
        let prior = self.prior.apply_operator(op)?;
        let batches = self
            .batches
            .iter()
            .map(|b| {
                Ok(ObservationBatch {
                    crosscov: apply_to_crosscov(op, Arc::clone(&b.crosscov))?,
                    ..b.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(operator = op.name(), batches = batches.len(), "transformed posterior");
        Ok(PosteriorGaussianProcess {
            prior,
            batches,
            factor: Arc::clone(&self.factor),
            whitened: self.whitened.clone(),
            representer_weights: Arc::clone(&self.representer_weights),
        })
    }

    fn crosscovs(&self) -> Vec<Arc<dyn ProcessVectorCrossCovariance>> {
        self.batches.iter().map(|b| Arc::clone(&b.crosscov)).collect()
    }

    pub fn mean_function(&self) -> Arc<PosteriorMean> {
        Arc::new(PosteriorMean {
            prior_mean: Arc::clone(self.prior.mean_function()),
            crosscovs: self.crosscovs(),
            weights: Arc::clone(&self.representer_weights),
        })
    }

    pub fn cov_kernel(&self) -> Arc<PosteriorKernel> {
        Arc::new(PosteriorKernel {
            prior_cov: Arc::clone(self.prior.cov_kernel()),
            crosscovs: self.crosscovs(),
            factor: Arc::clone(&self.factor),
        })
    }

    /// The posterior as a plain [`GaussianProcess`], usable as a prior.
    pub fn as_gaussian_process(&self) -> Result<GaussianProcess> {
        GaussianProcess::new(self.mean_function(), self.cov_kernel())
    }
}

impl RandomProcess for PosteriorGaussianProcess {
    fn input_dim(&self) -> usize {
        self.prior.input_dim()
    }

    fn name(&self) -> &'static str {
        "PosteriorGaussianProcess"
    }

    fn mean(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.mean_function().evaluate_batch(x)
    }

    fn cov(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.cov_kernel().matrix(x0, x1)
    }

    fn var(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.cov_kernel().diagonal(x)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn solve_lower(l: &DMatrix<f64>, b: &DMatrix<f64>, batch: usize) -> Result<DMatrix<f64>> {
    l.solve_lower_triangular(b)
        .ok_or(Error::NotPositiveDefinite {
            batch,
            size: l.nrows(),
        })
}

/// `rows(x) × n` matrix of all batch cross-covariances side by side.
fn crosscov_matrix(
    crosscovs: &[Arc<dyn ProcessVectorCrossCovariance>],
    x: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let n: usize = crosscovs.iter().map(|cc| cc.len()).sum();
    let mut out = DMatrix::zeros(x.nrows(), n);
    let mut offset = 0;
    for cc in crosscovs {
        let block = cc.evaluate(x)?;
        out.view_mut((0, offset), (x.nrows(), cc.len()))
            .copy_from(&block);
        offset += cc.len();
    }
    Ok(out)
}

fn crosscov_point(
    crosscovs: &[Arc<dyn ProcessVectorCrossCovariance>],
    x: &[f64],
) -> Result<DVector<f64>> {
    let mut values = Vec::new();
    for cc in crosscovs {
        values.extend(cc.eval_point(x)?);
    }
    Ok(DVector::from_vec(values))
}

fn crosscov_hyper(
    crosscovs: &[Arc<dyn ProcessVectorCrossCovariance>],
    x: &[HyperDual],
) -> Result<Vec<HyperDual>> {
    let mut values = Vec::new();
    for cc in crosscovs {
        values.extend(cc.eval_hyper(x)?);
    }
    Ok(values)
}

/// `L⁻¹ b` by forward substitution.
fn forward_substitute(l: &DMatrix<f64>, b: Vec<HyperDual>) -> Vec<HyperDual> {
    let mut out: Vec<HyperDual> = Vec::with_capacity(b.len());
    for (i, bi) in b.into_iter().enumerate() {
        let mut acc = bi;
        for (j, vj) in out.iter().enumerate() {
            acc -= &(vj * l[(i, j)]);
        }
        out.push(acc / l[(i, i)]);
    }
    out
}

/// `m*(x) = m(x) + k(x, l) α`.
#[derive(Clone, Debug)]
pub struct PosteriorMean {
    prior_mean: Arc<dyn Function>,
    crosscovs: Vec<Arc<dyn ProcessVectorCrossCovariance>>,
    weights: Arc<DVector<f64>>,
}

impl Function for PosteriorMean {
    fn input_dim(&self) -> usize {
        self.prior_mean.input_dim()
    }

    fn name(&self) -> &'static str {
        "PosteriorMean"
    }

    fn eval_point(&self, x: &[f64]) -> Result<f64> {
        let kxl = crosscov_point(&self.crosscovs, x)?;
        Ok(self.prior_mean.eval_point(x)? + kxl.dot(&self.weights))
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim(), x.len())?;
        let mut total = self.prior_mean.eval_hyper(x)?.lift(max_bits([x]));
        for (k, w) in crosscov_hyper(&self.crosscovs, x)?.iter().zip(self.weights.iter()) {
            total += &(k * *w);
        }
        Ok(total)
    }

    fn is_differentiable(&self) -> bool {
        self.prior_mean.is_differentiable() && self.crosscovs.iter().all(|cc| cc.is_differentiable())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn evaluate_batch(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        check_points(self.name(), self.input_dim(), x)?;
        let prior = self.prior_mean.evaluate_batch(x)?;
        Ok(prior + crosscov_matrix(&self.crosscovs, x)? * &*self.weights)
    }
}

/// `k*(x0, x1) = k(x0, x1) − k(x0, l) K_ll⁻¹ k(l, x1)`.
#[derive(Clone, Debug)]
pub struct PosteriorKernel {
    prior_cov: Arc<dyn Kernel>,
    crosscovs: Vec<Arc<dyn ProcessVectorCrossCovariance>>,
    factor: Arc<DMatrix<f64>>,
}

impl PosteriorKernel {
    /// `L⁻¹ k(l, X)`, one column per row of `x`.
    fn whitened_crosscov(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let kxl = crosscov_matrix(&self.crosscovs, x)?;
        if self.factor.nrows() == 0 {
            return Ok(DMatrix::zeros(0, x.nrows()));
        }
        solve_lower(&self.factor, &kxl.transpose(), self.crosscovs.len().saturating_sub(1))
    }

    fn whitened_point(&self, x: &[f64]) -> Result<DVector<f64>> {
        let kxl = crosscov_point(&self.crosscovs, x)?;
        if self.factor.nrows() == 0 {
            return Ok(kxl);
        }
        self.factor
            .solve_lower_triangular(&kxl)
            .ok_or(Error::NotPositiveDefinite {
                batch: self.crosscovs.len().saturating_sub(1),
                size: self.factor.nrows(),
            })
    }
}

impl Kernel for PosteriorKernel {
    fn input_dim(&self) -> usize {
        self.prior_cov.input_dim()
    }

    fn name(&self) -> &'static str {
        "PosteriorKernel"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        let prior = self.prior_cov.eval_point(x0, x1)?;
        let v0 = self.whitened_point(x0)?;
        let correction = match x1 {
            Some(x1) => v0.dot(&self.whitened_point(x1)?),
            None => v0.norm_squared(),
        };
        Ok(prior - correction)
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        check_dim(self.name(), self.input_dim(), x0.len())?;
        check_dim(self.name(), self.input_dim(), x1.len())?;
        let prior = self.prior_cov.eval_hyper(x0, x1)?;
        let v0 = forward_substitute(&self.factor, crosscov_hyper(&self.crosscovs, x0)?);
        let v1 = forward_substitute(&self.factor, crosscov_hyper(&self.crosscovs, x1)?);
        let mut total = prior.lift(max_bits([x0, x1]));
        for (a, b) in v0.iter().zip(&v1) {
            total -= &(a * b);
        }
        Ok(total)
    }

    fn is_differentiable(&self) -> bool {
        self.prior_cov.is_differentiable() && self.crosscovs.iter().all(|cc| cc.is_differentiable())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn matrix(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let prior = self.prior_cov.matrix(x0, x1)?;
        let v0 = self.whitened_crosscov(x0)?;
        let v1 = self.whitened_crosscov(x1)?;
        Ok(prior - v0.transpose() * v1)
    }

    fn diagonal(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        let prior = self.prior_cov.diagonal(x)?;
        let v = self.whitened_crosscov(x)?;
        let correction = DVector::from_iterator(x.nrows(), v.column_iter().map(|c| c.norm_squared()));
        Ok(prior - correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::ExpQuad;
    use approx::assert_relative_eq;

    fn prior() -> GaussianProcess {
        GaussianProcess::centered(Arc::new(ExpQuad::new(1, 0.5, 1.0).unwrap()))
    }

    #[test]
    fn interpolates_exact_observations() {
        let x = DMatrix::from_column_slice(3, 1, &[-0.5, 0.0, 0.5]);
        let y = DVector::from_vec(vec![1.0, -1.0, 2.0]);
        let post = prior()
            .condition_on_observations(x.clone(), y.clone(), None, None)
            .unwrap();
        assert_relative_eq!(post.mean(&x).unwrap(), y, epsilon = 1e-8);
        assert_relative_eq!(post.var(&x).unwrap(), DVector::zeros(3), epsilon = 1e-8);
    }

    #[test]
    fn conditioning_leaves_receiver_untouched() {
        let p0 = PosteriorGaussianProcess::from_prior(prior());
        let x = DMatrix::from_column_slice(1, 1, &[0.2]);
        let p1 = p0
            .condition_on_observations(x.clone(), DVector::from_element(1, 1.0), None, None)
            .unwrap();
        assert_eq!(p0.num_observations(), 0);
        assert_eq!(p1.num_observations(), 1);
        assert_relative_eq!(p0.mean(&x).unwrap()[0], 0.0);
    }

    #[test]
    fn indefinite_gram_is_reported_with_batch_index() {
        let p1 = prior()
            .condition_on_observations(
                DMatrix::from_column_slice(1, 1, &[-0.3]),
                DVector::from_element(1, 0.5),
                None,
                None,
            )
            .unwrap();
        // k(x, x) = 1 plus a noise variance of −2
        let noise = Normal::isotropic(DVector::zeros(2), -2.0);
        let x = DMatrix::from_column_slice(2, 1, &[0.3, 0.6]);
        let err = p1
            .condition_on_observations(x, DVector::from_vec(vec![1.0, 1.0]), Some(noise), None)
            .unwrap_err();
        assert_eq!(err, Error::NotPositiveDefinite { batch: 1, size: 2 });
    }

    #[test]
    fn rejects_mismatched_values() {
        let x = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);
        let err = prior()
            .condition_on_observations(x, DVector::zeros(3), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
