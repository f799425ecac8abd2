//! Closed forms of Laplacians applied to a `p = 3` [`ProductMatern`].
//!
//! Each kernel is a sum over the dimensions an operator differentiates of
//! products of per-dimension factors: the undifferentiated `k`, or one of its
//! derivatives in `δ = x0_d − x1_d`. Even-order derivatives are the same on
//! either argument; odd-order ones flip sign on `x1`.

use std::any::Any;
use std::sync::Arc;

use crate::error::{check_dim, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::matern::{masked_product, ProductMatern};
use crate::kernels::matern_directional::ProductMaternIdentityDirectionalDerivative;
use crate::kernels::Kernel;
use crate::scalar::Scalar;

/// `Δ k` with the Laplacian on one argument.
///
/// `reverse == true` means the Laplacian acts on argument 0, leaving
/// argument 1 free for a further operator.
#[derive(Clone, Debug)]
pub struct ProductMaternIdentityLaplacian {
    matern: Arc<ProductMatern>,
    reverse: bool,
}

impl ProductMaternIdentityLaplacian {
    pub fn new(matern: Arc<ProductMatern>, reverse: bool) -> Result<Self> {
        matern.require_closed_form("ProductMaternIdentityLaplacian")?;
        Ok(ProductMaternIdentityLaplacian { matern, reverse })
    }

    pub fn matern(&self) -> &Arc<ProductMatern> {
        &self.matern
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    fn eval<T: Scalar>(&self, x0: &[T], x1: Option<&[T]>) -> T {
        let deltas = ProductMatern::diffs(x0, x1);
        let factors = self.matern.factors(&deltas);
        (0..deltas.len())
            .map(|i| {
                masked_product(&factors, |d| {
                    (d == i).then(|| self.matern.factor_d2(d, &deltas[d]))
                })
            })
            .fold(T::zero(), |acc, term| acc + term)
    }
}

impl Kernel for ProductMaternIdentityLaplacian {
    fn input_dim(&self) -> usize {
        self.matern.input_dim()
    }

    fn name(&self) -> &'static str {
        "ProductMaternIdentityLaplacian"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        Ok(self.eval(x0, x1))
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        self.matern.check_inputs(self.name(), x0, x1)?;
        Ok(self.eval(x0, Some(x1)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `Δ₀ Δ₁ k`.
#[derive(Clone, Debug)]
pub struct ProductMaternLaplacianLaplacian {
    matern: Arc<ProductMatern>,
}

impl ProductMaternLaplacianLaplacian {
    pub fn new(matern: Arc<ProductMatern>) -> Result<Self> {
        matern.require_closed_form("ProductMaternLaplacianLaplacian")?;
        Ok(ProductMaternLaplacianLaplacian { matern })
    }

    pub fn matern(&self) -> &Arc<ProductMatern> {
        &self.matern
    }

    fn eval<T: Scalar>(&self, x0: &[T], x1: Option<&[T]>) -> T {
        let deltas = ProductMatern::diffs(x0, x1);
        let factors = self.matern.factors(&deltas);
        let n = deltas.len();
        let mut total = T::zero();
        for i in 0..n {
            for j in 0..n {
                total = total
                    + masked_product(&factors, |d| {
                        if d == i && d == j {
                            Some(self.matern.factor_d4(d, &deltas[d]))
                        } else if d == i || d == j {
                            Some(self.matern.factor_d2(d, &deltas[d]))
                        } else {
                            None
                        }
                    });
            }
        }
        total
    }
}

impl Kernel for ProductMaternLaplacianLaplacian {
    fn input_dim(&self) -> usize {
        self.matern.input_dim()
    }

    fn name(&self) -> &'static str {
        "ProductMaternLaplacianLaplacian"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        Ok(self.eval(x0, x1))
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        self.matern.check_inputs(self.name(), x0, x1)?;
        Ok(self.eval(x0, Some(x1)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `D_v Δ k` with the directional derivative and the Laplacian on opposite
/// arguments.
///
/// `reverse == false`: derivative on `x0`, Laplacian on `x1`.
/// `reverse == true`: derivative on `x1`, Laplacian on `x0`.
#[derive(Clone, Debug)]
pub struct ProductMaternDirectionalDerivativeLaplacian {
    matern: Arc<ProductMatern>,
    direction: Vec<f64>,
    reverse: bool,
    /// `±s_d⁴ v_d`, negative when `reverse`.
    rescaled_direction: Vec<f64>,
}

impl ProductMaternDirectionalDerivativeLaplacian {
    pub fn new(matern: Arc<ProductMatern>, direction: Vec<f64>, reverse: bool) -> Result<Self> {
        matern.require_closed_form("ProductMaternDirectionalDerivativeLaplacian")?;
        check_dim(
            "ProductMaternDirectionalDerivativeLaplacian direction",
            matern.input_dim(),
            direction.len(),
        )?;
        let sign = if reverse { -1.0 } else { 1.0 };
        let rescaled_direction = direction
            .iter()
            .zip(matern.scale_factors())
            .map(|(v, s)| sign * s.powi(4) * v)
            .collect();
        Ok(ProductMaternDirectionalDerivativeLaplacian {
            matern,
            direction,
            reverse,
            rescaled_direction,
        })
    }

    pub fn matern(&self) -> &Arc<ProductMatern> {
        &self.matern
    }

    pub fn direction(&self) -> &[f64] {
        &self.direction
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    fn eval<T: Scalar>(&self, x0: &[T], x1: Option<&[T]>) -> T {
        let deltas = ProductMatern::diffs(x0, x1);
        let factors = self.matern.factors(&deltas);
        let n = deltas.len();
        let mut total = T::zero();
        for i in (0..n).filter(|&i| self.direction[i] != 0.0) {
            for j in 0..n {
                total = total
                    + masked_product(&factors, |d| {
                        if d == i && d == j {
                            Some(
                                self.matern.factor_d3_unscaled(d, &deltas[d])
                                    * self.rescaled_direction[d],
                            )
                        } else if d == i {
                            Some(ProductMaternIdentityDirectionalDerivative::derivative_factor(
                                &self.matern,
                                &self.direction,
                                !self.reverse,
                                d,
                                &deltas[d],
                            ))
                        } else if d == j {
                            Some(self.matern.factor_d2(d, &deltas[d]))
                        } else {
                            None
                        }
                    });
            }
        }
        total
    }
}

impl Kernel for ProductMaternDirectionalDerivativeLaplacian {
    fn input_dim(&self) -> usize {
        self.matern.input_dim()
    }

    fn name(&self) -> &'static str {
        "ProductMaternDirectionalDerivativeLaplacian"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        Ok(self.eval(x0, x1))
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        self.matern.check_inputs(self.name(), x0, x1)?;
        Ok(self.eval(x0, Some(x1)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
