//! Domains of the input space.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Closed interval `[lower, upper]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "IntervalBounds")
)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct IntervalBounds {
    lower: f64,
    upper: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<IntervalBounds> for Interval {
    type Error = Error;

    fn try_from(b: IntervalBounds) -> Result<Self> {
        Interval::new(b.lower, b.upper)
    }
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
            return Err(Error::InvalidArgument(format!(
                "interval bounds must be finite with lower < upper, got [{lower}, {upper}]"
            )));
        }
        Ok(Interval { lower, upper })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    pub fn length(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

impl IntoIterator for Interval {
    type Item = f64;
    type IntoIter = std::array::IntoIter<f64, 2>;

    fn into_iter(self) -> Self::IntoIter {
        [self.lower, self.upper].into_iter()
    }
}
