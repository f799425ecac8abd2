use std::any::Any;
use std::sync::Arc;

use crate::error::{check_dim, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::matern::{masked_product, ProductMatern};
use crate::kernels::Kernel;
use crate::scalar::Scalar;

/// `D_v k` for a `p = 3` [`ProductMatern`], with the directional derivative
/// on one argument and the identity on the other.
///
/// `reverse == false`: derivative on `x1`, so `Σ_i −v_i k'(δ_i) Π_{d≠i} k(δ_d)`.
/// `reverse == true`: derivative on `x0`, which flips the sign.
#[derive(Clone, Debug)]
pub struct ProductMaternIdentityDirectionalDerivative {
    matern: Arc<ProductMatern>,
    direction: Vec<f64>,
    reverse: bool,
}

impl ProductMaternIdentityDirectionalDerivative {
    pub fn new(matern: Arc<ProductMatern>, direction: Vec<f64>, reverse: bool) -> Result<Self> {
        matern.require_closed_form("ProductMaternIdentityDirectionalDerivative")?;
        check_dim(
            "ProductMaternIdentityDirectionalDerivative direction",
            matern.input_dim(),
            direction.len(),
        )?;
        Ok(ProductMaternIdentityDirectionalDerivative {
            matern,
            direction,
            reverse,
        })
    }

    pub fn matern(&self) -> &Arc<ProductMatern> {
        &self.matern
    }

    pub fn direction(&self) -> &[f64] {
        &self.direction
    }

    /// Whether the derivative acts on argument 0.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    /// `±v_d k'(δ_d)`, positive when the derivative acts on `x0`.
    pub(crate) fn derivative_factor<T: Scalar>(
        matern: &ProductMatern,
        direction: &[f64],
        on_x0: bool,
        dim: usize,
        delta: &T,
    ) -> T {
        let sign = if on_x0 { 1.0 } else { -1.0 };
        matern.factor_d1(dim, delta) * (sign * direction[dim])
    }

    fn eval<T: Scalar>(&self, x0: &[T], x1: Option<&[T]>) -> T {
        let deltas = ProductMatern::diffs(x0, x1);
        let factors = self.matern.factors(&deltas);
        (0..deltas.len())
            .filter(|&i| self.direction[i] != 0.0)
            .map(|i| {
                masked_product(&factors, |d| {
                    (d == i).then(|| {
                        Self::derivative_factor(
                            &self.matern,
                            &self.direction,
                            self.reverse,
                            d,
                            &deltas[d],
                        )
                    })
                })
            })
            .fold(T::zero(), |acc, term| acc + term)
    }
}

impl Kernel for ProductMaternIdentityDirectionalDerivative {
    fn input_dim(&self) -> usize {
        self.matern.input_dim()
    }

    fn name(&self) -> &'static str {
        "ProductMaternIdentityDirectionalDerivative"
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
