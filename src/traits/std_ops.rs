use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::hyperdual::{convolve, zip_padded, HyperDual};

// ──────────────────────────────────────────────
//  HyperDual ⊕ HyperDual
// ──────────────────────────────────────────────

impl Add<&HyperDual> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn add(self, rhs: &HyperDual) -> HyperDual {
        HyperDual::from_raw(zip_padded(self.raw(), rhs.raw(), |a, b| a + b))
    }
}

impl Sub<&HyperDual> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn sub(self, rhs: &HyperDual) -> HyperDual {
        HyperDual::from_raw(zip_padded(self.raw(), rhs.raw(), |a, b| a - b))
    }
}

impl Mul<&HyperDual> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn mul(self, rhs: &HyperDual) -> HyperDual {
        HyperDual::from_raw(convolve(self.raw(), rhs.raw()))
    }
}

impl Div<&HyperDual> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn div(self, rhs: &HyperDual) -> HyperDual {
        if rhs.num_bits() == 0 {
            return self.scale(1.0 / rhs.value());
        }
        self * &rhs.recip()
    }
}

impl Neg for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn neg(self) -> HyperDual {
        self.scale(-1.0)
    }
}

impl Neg for HyperDual {
    type Output = HyperDual;
    #[inline]
    fn neg(mut self) -> HyperDual {
        for c in self.raw_mut() {
            *c = -*c;
        }
        self
    }
}

// Owned/borrowed combinations forward to the borrowed impls.
macro_rules! forward_binop {
    ($tr:ident, $method:ident) => {
        impl $tr<HyperDual> for HyperDual {
            type Output = HyperDual;
            #[inline]
            fn $method(self, rhs: HyperDual) -> HyperDual {
                (&self).$method(&rhs)
            }
        }

        impl $tr<&HyperDual> for HyperDual {
            type Output = HyperDual;
            #[inline]
            fn $method(self, rhs: &HyperDual) -> HyperDual {
                (&self).$method(rhs)
            }
        }

        impl $tr<HyperDual> for &HyperDual {
            type Output = HyperDual;
            #[inline]
            fn $method(self, rhs: HyperDual) -> HyperDual {
                self.$method(&rhs)
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);
forward_binop!(Div, div);

// ──────────────────────────────────────────────
//  Mixed ops with f64
// ──────────────────────────────────────────────

impl Add<f64> for HyperDual {
    type Output = HyperDual;
    #[inline]
    fn add(mut self, rhs: f64) -> HyperDual {
        self.raw_mut()[0] += rhs;
        self
    }
}

impl Sub<f64> for HyperDual {
    type Output = HyperDual;
    #[inline]
    fn sub(mut self, rhs: f64) -> HyperDual {
        self.raw_mut()[0] -= rhs;
        self
    }
}

impl Mul<f64> for HyperDual {
    type Output = HyperDual;
    #[inline]
    fn mul(mut self, rhs: f64) -> HyperDual {
        for c in self.raw_mut() {
            *c *= rhs;
        }
        self
    }
}

impl Div<f64> for HyperDual {
    type Output = HyperDual;
    #[inline]
    fn div(self, rhs: f64) -> HyperDual {
        self * (1.0 / rhs)
    }
}

impl Add<f64> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn add(self, rhs: f64) -> HyperDual {
        self.clone() + rhs
    }
}

impl Sub<f64> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn sub(self, rhs: f64) -> HyperDual {
        self.clone() - rhs
    }
}

impl Mul<f64> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn mul(self, rhs: f64) -> HyperDual {
        self.scale(rhs)
    }
}

impl Div<f64> for &HyperDual {
    type Output = HyperDual;
    #[inline]
    fn div(self, rhs: f64) -> HyperDual {
        self.scale(1.0 / rhs)
    }
}

impl Add<HyperDual> for f64 {
    type Output = HyperDual;
    #[inline]
    fn add(self, rhs: HyperDual) -> HyperDual {
        rhs + self
    }
}

impl Sub<HyperDual> for f64 {
    type Output = HyperDual;
    #[inline]
    fn sub(self, rhs: HyperDual) -> HyperDual {
        -rhs + self
    }
}

impl Mul<HyperDual> for f64 {
    type Output = HyperDual;
    #[inline]
    fn mul(self, rhs: HyperDual) -> HyperDual {
        rhs * self
    }
}

impl Div<HyperDual> for f64 {
    type Output = HyperDual;
    #[inline]
    fn div(self, rhs: HyperDual) -> HyperDual {
        rhs.recip() * self
    }
}

// ──────────────────────────────────────────────
//  Assignment ops and iterator sums
// ──────────────────────────────────────────────

impl AddAssign<&HyperDual> for HyperDual {
    #[inline]
    fn add_assign(&mut self, rhs: &HyperDual) {
        if rhs.raw().len() <= self.raw().len() {
            for (a, b) in self.raw_mut().iter_mut().zip(rhs.raw()) {
                *a += b;
            }
        } else {
            *self = &*self + rhs;
        }
    }
}

impl AddAssign for HyperDual {
    #[inline]
    fn add_assign(&mut self, rhs: HyperDual) {
        *self += &rhs;
    }
}

impl SubAssign<&HyperDual> for HyperDual {
    #[inline]
    fn sub_assign(&mut self, rhs: &HyperDual) {
        *self = &*self - rhs;
    }
}

impl SubAssign for HyperDual {
    #[inline]
    fn sub_assign(&mut self, rhs: HyperDual) {
        *self -= &rhs;
    }
}

impl MulAssign<&HyperDual> for HyperDual {
    #[inline]
    fn mul_assign(&mut self, rhs: &HyperDual) {
        *self = &*self * rhs;
    }
}

impl MulAssign for HyperDual {
    #[inline]
    fn mul_assign(&mut self, rhs: HyperDual) {
        *self *= &rhs;
    }
}

impl MulAssign<f64> for HyperDual {
    #[inline]
    fn mul_assign(&mut self, rhs: f64) {
        for c in self.raw_mut() {
            *c *= rhs;
        }
    }
}

impl DivAssign for HyperDual {
    #[inline]
    fn div_assign(&mut self, rhs: HyperDual) {
        *self = &*self / &rhs;
    }
}

impl Sum for HyperDual {
    fn sum<I: Iterator<Item = HyperDual>>(iter: I) -> HyperDual {
        iter.fold(HyperDual::constant(0.0), |mut acc, x| {
            acc += &x;
            acc
        })
    }
}

impl<'a> Sum<&'a HyperDual> for HyperDual {
    fn sum<I: Iterator<Item = &'a HyperDual>>(iter: I) -> HyperDual {
        iter.fold(HyperDual::constant(0.0), |mut acc, x| {
            acc += x;
            acc
        })
    }
}
