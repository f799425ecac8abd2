use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::bases::{out_of_range, Basis, HatGrid};
use crate::domains::Interval;
use crate::error::{check_dim, Result};
use crate::functions::Function;

/// Piecewise-linear interpolation of nodal values on
/// `linspace(lower, upper, n + 2)`.
///
/// Coefficients are the function values at the nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearInterpolationBasis {
    grid: HatGrid,
}

impl LinearInterpolationBasis {
    pub fn new(domain: Interval, num_elements: usize) -> Self {
        LinearInterpolationBasis {
            grid: HatGrid::new(domain, num_elements + 2),
        }
    }

    /// Coefficients reproducing `f` at the nodes.
    pub fn interpolate(&self, f: &dyn Function) -> Result<DVector<f64>> {
        let values = self
            .grid
            .nodes()
            .iter()
            .map(|x| f.evaluate(&[*x]))
            .collect::<Result<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }
}

impl Basis for LinearInterpolationBasis {
    fn size(&self) -> usize {
        self.grid.nodes().len()
    }

    fn domain(&self) -> &Interval {
        self.grid.domain()
    }

    fn grid(&self) -> &[f64] {
        self.grid.nodes()
    }

    fn get(&self, idx: usize) -> Result<Arc<dyn Function>> {
        if idx >= self.size() {
            return Err(out_of_range(idx, self.size()));
        }
        Ok(self.grid.hat(idx))
    }

    fn coords2fn(&self, coords: &DVector<f64>) -> Result<Arc<dyn Function>> {
        check_dim("basis coordinates", self.size(), coords.len())?;
        Ok(self.grid.interpolant(coords.iter().copied().collect()))
    }

    fn observation_operator(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.grid.weight_matrix(x, 0, self.size())
    }
}
