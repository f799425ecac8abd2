use num_traits::{One, Zero};

use crate::hyperdual::HyperDual;

impl Zero for HyperDual {
    #[inline]
    fn zero() -> Self {
        HyperDual::constant(0.0)
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.coeffs().iter().all(|c| *c == 0.0)
    }
}

impl One for HyperDual {
    #[inline]
    fn one() -> Self {
        HyperDual::constant(1.0)
    }
}
