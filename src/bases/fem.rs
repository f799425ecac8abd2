use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::bases::{out_of_range, Basis, HatGrid};
use crate::domains::Interval;
use crate::error::{check_dim, Error, Result};
use crate::functions::Function;

/// `n` interior hat functions on `linspace(lower, upper, n + 2)`; every
/// element vanishes on the boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct ZeroBoundaryFiniteElementBasis {
    grid: HatGrid,
    num_elements: usize,
}

impl ZeroBoundaryFiniteElementBasis {
    pub fn new(domain: Interval, num_elements: usize) -> Result<Self> {
        if num_elements == 0 {
            return Err(Error::InvalidArgument(
                "zero-boundary basis needs at least one element".to_string(),
            ));
        }
        Ok(ZeroBoundaryFiniteElementBasis {
            grid: HatGrid::new(domain, num_elements + 2),
            num_elements,
        })
    }
}

impl Basis for ZeroBoundaryFiniteElementBasis {
    fn size(&self) -> usize {
        self.num_elements
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
        Ok(self.grid.hat(idx + 1))
    }

    fn coords2fn(&self, coords: &DVector<f64>) -> Result<Arc<dyn Function>> {
        check_dim("basis coordinates", self.size(), coords.len())?;
        let mut values = Vec::with_capacity(self.size() + 2);
        values.push(0.0);
        values.extend(coords.iter().copied());
        values.push(0.0);
        Ok(self.grid.interpolant(values))
    }

    fn observation_operator(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.grid.weight_matrix(x, 1, self.size())
    }
}

/// `n + 2` hat functions on `linspace(lower, upper, n + 2)`, including the
/// boundary half-hats.
#[derive(Clone, Debug, PartialEq)]
pub struct FiniteElementBasis {
    grid: HatGrid,
}

impl FiniteElementBasis {
    pub fn new(domain: Interval, num_elements: usize) -> Self {
        FiniteElementBasis {
            grid: HatGrid::new(domain, num_elements + 2),
        }
    }
}

impl Basis for FiniteElementBasis {
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_boundary_grid() {
        let basis = ZeroBoundaryFiniteElementBasis::new(Interval::new(0.0, 1.0).unwrap(), 3).unwrap();
        assert_eq!(basis.grid(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        let phi = basis.get(0).unwrap();
        assert_relative_eq!(phi.evaluate(&[0.25]).unwrap(), 1.0);
        assert_relative_eq!(phi.evaluate(&[0.125]).unwrap(), 0.5);
        assert_relative_eq!(phi.evaluate(&[0.5]).unwrap(), 0.0);
        assert!(basis.get(3).is_err());
    }

    #[test]
    fn boundary_half_hats() {
        let basis = FiniteElementBasis::new(Interval::new(-1.0, 1.0).unwrap(), 1);
        assert_eq!(basis.size(), 3);
        let last = basis.get_signed(-1).unwrap();
        assert_relative_eq!(last.evaluate(&[1.0]).unwrap(), 1.0);
        assert_relative_eq!(last.evaluate(&[0.5]).unwrap(), 0.5);
        assert_relative_eq!(last.evaluate(&[1.5]).unwrap(), 0.0);
    }
}
