//! Product-Matérn kernel with half-integer smoothness `ν = p + 1/2`.
//!
//! ```text
//! k(x0, x1) = Π_i k_p(s_i |x0_i − x1_i|),   s_i = √(2p + 1) / ℓ_i
//! k_p(r)    = e^{−r} Σ_{j=0}^{p} c_j r^j,   c_j = p!/(2p)! · (2p − j)! / ((p − j)! j!) · 2^j
//! ```
//!
//! Besides the kernel itself this module holds the closed-form derivatives of
//! the one-dimensional `p = 3` factor in `δ = x0_i − x1_i`, which the
//! specialized operator kernels assemble dimension by dimension.

use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{check_dim, Error, Result};
use crate::hyperdual::HyperDual;
use crate::kernels::Kernel;
use crate::scalar::Scalar;

/// Serializable parameters of a [`ProductMatern`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductMaternParams {
    pub lengthscales: Vec<f64>,
    pub p: usize,
}

impl ProductMaternParams {
    pub fn build(&self) -> Result<ProductMatern> {
        ProductMatern::new(self.lengthscales.clone(), self.p)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductMatern {
    lengthscales: Vec<f64>,
    p: usize,
    scale_factors: Vec<f64>,
    poly: Vec<f64>,
}

impl ProductMatern {
    /// One lengthscale per input dimension.
    pub fn new(lengthscales: Vec<f64>, p: usize) -> Result<Self> {
        if lengthscales.is_empty() {
            return Err(Error::InvalidArgument(
                "ProductMatern needs at least one lengthscale".to_string(),
            ));
        }
        if let Some(l) = lengthscales.iter().find(|l| l.is_nan() || **l <= 0.0) {
            return Err(Error::InvalidArgument(format!(
                "ProductMatern lengthscales must be positive, got {l}"
            )));
        }
        let nu2 = (2 * p + 1) as f64;
        let scale_factors = lengthscales.iter().map(|l| nu2.sqrt() / l).collect();
        Ok(ProductMatern {
            lengthscales,
            p,
            scale_factors,
            poly: polynomial(p),
        })
    }

    pub fn isotropic(input_dim: usize, lengthscale: f64, p: usize) -> Result<Self> {
        Self::new(vec![lengthscale; input_dim], p)
    }

    pub fn p(&self) -> usize {
        self.p
    }

    pub fn lengthscales(&self) -> &[f64] {
        &self.lengthscales
    }

    /// `s_i = √(2p + 1) / ℓ_i`.
    pub fn scale_factors(&self) -> &[f64] {
        &self.scale_factors
    }

    pub fn params(&self) -> ProductMaternParams {
        ProductMaternParams {
            lengthscales: self.lengthscales.clone(),
            p: self.p,
        }
    }

    /// Fails unless the closed forms exist for this order.
    pub(crate) fn require_closed_form(&self, kernel: &'static str) -> Result<()> {
        if self.p == 3 {
            Ok(())
        } else {
            Err(Error::UnsupportedSmoothness { kernel, p: self.p })
        }
    }

    pub(crate) fn check_inputs<T>(&self, kernel: &'static str, x0: &[T], x1: &[T]) -> Result<()> {
        check_dim(kernel, self.lengthscales.len(), x0.len())?;
        check_dim(kernel, self.lengthscales.len(), x1.len())
    }

    /// `x0 − x1` per dimension; zeros on the diagonal.
    pub(crate) fn diffs<T: Scalar>(x0: &[T], x1: Option<&[T]>) -> Vec<T> {
        match x1 {
            Some(x1) => x0
                .iter()
                .zip(x1)
                .map(|(a, b)| a.clone() - b.clone())
                .collect(),
            None => vec![T::zero(); x0.len()],
        }
    }

    fn scaled_dist<T: Scalar>(&self, dim: usize, delta: &T) -> T {
        delta.abs() * self.scale_factors[dim]
    }

    /// `k_p(s |δ|)`.
    pub(crate) fn factor<T: Scalar>(&self, dim: usize, delta: &T) -> T {
        let r = self.scaled_dist(dim, delta);
        let mut acc = T::from_f64(self.poly[self.p]);
        for c in self.poly[..self.p].iter().rev() {
            acc = acc * r.clone() + *c;
        }
        (-r).exp() * acc
    }

    /// `∂_δ k₃(s|δ|) = −s²/15 · δ e^{−r} (3 + r(3 + r))`.
    pub(crate) fn factor_d1<T: Scalar>(&self, dim: usize, delta: &T) -> T {
        let s = self.scale_factors[dim];
        let r = self.scaled_dist(dim, delta);
        let poly = (r.clone() + 3.0) * r.clone() + 3.0;
        delta.clone() * (-r).exp() * poly * (-s * s / 15.0)
    }

    /// `∂²_δ k₃(s|δ|) = s² e^{−r} ((r²/15 − 1/5) r − 1/5)`.
    pub(crate) fn factor_d2<T: Scalar>(&self, dim: usize, delta: &T) -> T {
        let s = self.scale_factors[dim];
        let r = self.scaled_dist(dim, delta);
        let poly = (r.clone() * r.clone() * (1.0 / 15.0) - 0.2) * r.clone() - 0.2;
        (-r).exp() * poly * (s * s)
    }

    /// `∂³_δ k₃(s|δ|) = s⁴/15 · δ e^{−r} (3 + r(3 − r))`, without the `s⁴`
    /// (callers fold it into a rescaled direction).
    pub(crate) fn factor_d3_unscaled<T: Scalar>(&self, dim: usize, delta: &T) -> T {
        let r = self.scaled_dist(dim, delta);
        let poly = (-r.clone() + 3.0) * r.clone() + 3.0;
        delta.clone() * (-r).exp() * poly * (1.0 / 15.0)
    }

    /// `∂⁴_δ k₃(s|δ|) = s⁴ e^{−r} (((r/15 − 2/5) r + 1/5) r + 1/5)`.
    pub(crate) fn factor_d4<T: Scalar>(&self, dim: usize, delta: &T) -> T {
        let s = self.scale_factors[dim];
        let r = self.scaled_dist(dim, delta);
        let poly = ((r.clone() * (1.0 / 15.0) - 0.4) * r.clone() + 0.2) * r.clone() + 0.2;
        (-r).exp() * poly * (s * s * s * s)
    }

    /// Per-dimension undifferentiated factors.
    pub(crate) fn factors<T: Scalar>(&self, deltas: &[T]) -> Vec<T> {
        deltas
            .iter()
            .enumerate()
            .map(|(d, delta)| self.factor(d, delta))
            .collect()
    }

    fn eval<T: Scalar>(&self, x0: &[T], x1: Option<&[T]>) -> T {
        let deltas = Self::diffs(x0, x1);
        self.factors(&deltas)
            .into_iter()
            .fold(T::one(), |acc, f| acc * f)
    }
}

/// Coefficients of `Σ_j c_j r^j` for order `p`.
/// `c_0 = 1`, `c_{j+1} = c_j · 2(p − j) / ((2p − j)(j + 1))`.
fn polynomial(p: usize) -> Vec<f64> {
    let mut c = Vec::with_capacity(p + 1);
    let mut cj = 1.0;
    c.push(cj);
    for j in 0..p {
        cj *= 2.0 * (p - j) as f64 / (((2 * p - j) * (j + 1)) as f64);
        c.push(cj);
    }
    c
}

/// Product of `factors` with position `d` replaced by `select(d)` where it
/// returns `Some`.
pub(crate) fn masked_product<T: Scalar>(
    factors: &[T],
    mut select: impl FnMut(usize) -> Option<T>,
) -> T {
    factors
        .iter()
        .enumerate()
        .fold(T::one(), |acc, (d, f)| match select(d) {
            Some(g) => acc * g,
            None => acc * f.clone(),
        })
}

impl Kernel for ProductMatern {
    fn input_dim(&self) -> usize {
        self.lengthscales.len()
    }

    fn name(&self) -> &'static str {
        "ProductMatern"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        Ok(self.eval(x0, x1))
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        self.check_inputs(self.name(), x0, x1)?;
        Ok(self.eval(x0, Some(x1)))
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
    fn polynomial_p3() {
        let c = polynomial(3);
        assert_relative_eq!(c[0], 1.0, max_relative = 1e-14);
        assert_relative_eq!(c[1], 1.0, max_relative = 1e-14);
        assert_relative_eq!(c[2], 0.4, max_relative = 1e-14);
        assert_relative_eq!(c[3], 1.0 / 15.0, max_relative = 1e-14);
    }

    #[test]
    fn high_orders_stay_finite() {
        let c = polynomial(200);
        assert_eq!(c.len(), 201);
        assert!(c.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_relative_eq!(c[1], 1.0, max_relative = 1e-14);

        let k = ProductMatern::isotropic(1, 1.0, 200).unwrap();
        let v = k.evaluate(&[0.0], Some(&[0.1][..])).unwrap();
        assert!(v.is_finite() && v > 0.0 && v < 1.0);
        assert_relative_eq!(k.evaluate(&[0.0], Some(&[0.0][..])).unwrap(), 1.0);
    }

    #[test]
    fn low_orders_match_textbook() {
        // p = 0: e^{-r}; p = 1: (1 + r) e^{-r}
        let k0 = ProductMatern::isotropic(1, 1.0, 0).unwrap();
        assert_relative_eq!(k0.evaluate(&[0.0], Some(&[0.5][..])).unwrap(), (-0.5f64).exp());
        let k1 = ProductMatern::isotropic(1, 1.0, 1).unwrap();
        let r = 3f64.sqrt() * 0.5;
        assert_relative_eq!(
            k1.evaluate(&[0.0], Some(&[0.5][..])).unwrap(),
            (1.0 + r) * (-r).exp(),
            max_relative = 1e-14
        );
    }

    #[test]
    fn product_over_dimensions() {
        let k = ProductMatern::new(vec![0.5, 2.0], 3).unwrap();
        let k0 = ProductMatern::new(vec![0.5], 3).unwrap();
        let k1 = ProductMatern::new(vec![2.0], 3).unwrap();
        let v = k.evaluate(&[0.1, 0.4], Some(&[-0.2, 1.0][..])).unwrap();
        let v0 = k0.evaluate(&[0.1], Some(&[-0.2][..])).unwrap();
        let v1 = k1.evaluate(&[0.4], Some(&[1.0][..])).unwrap();
        assert_relative_eq!(v, v0 * v1, max_relative = 1e-14);
        assert_relative_eq!(k.evaluate(&[0.3, 0.3], None).unwrap(), 1.0);
    }

    #[test]
    fn rejects_bad_lengthscales() {
        assert!(ProductMatern::new(vec![], 3).is_err());
        assert!(ProductMatern::new(vec![1.0, -1.0], 3).is_err());
    }
}
