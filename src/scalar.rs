//! The [`Scalar`] trait for writing AD-generic kernel code.
//!
//! Closed-form kernels are written once as `fn eval<T: Scalar>(..) -> T` and
//! are then evaluated with plain `f64` for numeric Gram matrices and with
//! [`HyperDual`] whenever a further operator falls back to automatic
//! differentiation.

use std::fmt::Debug;
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::hyperdual::HyperDual;

/// Numeric type usable inside kernels, means and cross-covariances.
///
/// `HyperDual` is not `Copy`, so generic code clones where a value is reused.
pub trait Scalar:
    Clone
    + Debug
    + Zero
    + One
    + Sum
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + 'static
{
    /// Lift a plain float to this scalar as a constant.
    fn from_f64(val: f64) -> Self;

    /// Extract the primal value.
    fn value(&self) -> f64;

    fn exp(&self) -> Self;
    fn ln(&self) -> Self;
    fn sqrt(&self) -> Self;
    fn powi(&self, n: i32) -> Self;
    fn sin(&self) -> Self;
    fn cos(&self) -> Self;
    fn abs(&self) -> Self;
    fn recip(&self) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn exp(&self) -> Self {
        f64::exp(*self)
    }

    #[inline]
    fn ln(&self) -> Self {
        f64::ln(*self)
    }

    #[inline]
    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }

    #[inline]
    fn powi(&self, n: i32) -> Self {
        f64::powi(*self, n)
    }

    #[inline]
    fn sin(&self) -> Self {
        f64::sin(*self)
    }

    #[inline]
    fn cos(&self) -> Self {
        f64::cos(*self)
    }

    #[inline]
    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    #[inline]
    fn recip(&self) -> Self {
        f64::recip(*self)
    }
}

impl Scalar for HyperDual {
    #[inline]
    fn from_f64(val: f64) -> Self {
        HyperDual::constant(val)
    }

    #[inline]
    fn value(&self) -> f64 {
        HyperDual::value(self)
    }

    #[inline]
    fn exp(&self) -> Self {
        HyperDual::exp(self)
    }

    #[inline]
    fn ln(&self) -> Self {
        HyperDual::ln(self)
    }

    #[inline]
    fn sqrt(&self) -> Self {
        HyperDual::sqrt(self)
    }

    #[inline]
    fn powi(&self, n: i32) -> Self {
        HyperDual::powi(self, n)
    }

    #[inline]
    fn sin(&self) -> Self {
        HyperDual::sin(self)
    }

    #[inline]
    fn cos(&self) -> Self {
        HyperDual::cos(self)
    }

    #[inline]
    fn abs(&self) -> Self {
        HyperDual::abs(self)
    }

    #[inline]
    fn recip(&self) -> Self {
        HyperDual::recip(self)
    }
}
