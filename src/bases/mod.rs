//! Finite bases of functions on an interval, and the map from coefficient
//! vectors (deterministic or random) to functions and processes.

use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::domains::Interval;
use crate::error::{check_dim, Error, Result};
use crate::functions::{Function, LambdaFunction};
use crate::nalgebra_support::{check_points, linspace};
use crate::randprocs::{
    DeterministicProcess, ParametricGaussianProcess, RandomProcess, RandomVariable,
};

pub mod fem;
pub mod interpolation;

pub use fem::{FiniteElementBasis, ZeroBoundaryFiniteElementBasis};
pub use interpolation::LinearInterpolationBasis;

/// A finite family of scalar functions `φ_0, …, φ_{n−1}` on an interval.
pub trait Basis: Debug + Send + Sync {
    fn size(&self) -> usize;

    fn domain(&self) -> &Interval;

    /// Nodes of the underlying grid.
    fn grid(&self) -> &[f64];

    /// `φ_idx`.
    fn get(&self, idx: usize) -> Result<Arc<dyn Function>>;

    /// `φ_idx` with negative indices counted from the end.
    fn get_signed(&self, idx: isize) -> Result<Arc<dyn Function>> {
        let size = self.size() as isize;
        if idx < -size || idx >= size {
            return Err(Error::InvalidArgument(format!(
                "basis index {idx} out of range for size {size}"
            )));
        }
        let idx = if idx < 0 { idx + size } else { idx };
        self.get(idx as usize)
    }

    /// `x ↦ Σ_i c_i φ_i(x)`.
    fn coords2fn(&self, coords: &DVector<f64>) -> Result<Arc<dyn Function>>;

    /// `Φ[j, i] = φ_i(x_j)` for one-dimensional points `x`.
    fn observation_operator(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>>;

    /// Process with random coefficients: a point mass gives a deterministic
    /// process, a normal gives a parametric Gaussian process.
    fn coords2process(&self, coords: &RandomVariable) -> Result<Arc<dyn RandomProcess>>
    where
        Self: Clone + Sized + 'static,
    {
        match coords {
            RandomVariable::Constant(c) => Ok(Arc::new(DeterministicProcess::new(self.coords2fn(c)?))),
            RandomVariable::Normal(n) => {
                check_dim("coords2process weights", self.size(), n.size())?;
                let basis = self.clone();
                Ok(Arc::new(ParametricGaussianProcess::new(
                    1,
                    n.clone(),
                    move |x: &DMatrix<f64>| basis.observation_operator(x),
                )))
            }
            other => Err(Error::UnsupportedRandomVariable { kind: other.kind() }),
        }
    }
}

/// Piecewise-linear hat functions on an equispaced grid.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HatGrid {
    domain: Interval,
    nodes: Arc<[f64]>,
}

impl HatGrid {
    pub(crate) fn new(domain: Interval, num_nodes: usize) -> Self {
        HatGrid {
            domain,
            nodes: linspace(domain.lower(), domain.upper(), num_nodes).into(),
        }
    }

    pub(crate) fn domain(&self) -> &Interval {
        &self.domain
    }

    pub(crate) fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Non-zero interpolation weights at `x`: `(node, weight)` pairs.
    /// Empty outside the grid.
    pub(crate) fn weights(&self, x: f64) -> Vec<(usize, f64)> {
        interpolation_weights(&self.nodes, x)
    }

    /// Piecewise-linear interpolant through `(nodes, values)`; zero outside.
    pub(crate) fn interpolant(&self, values: Vec<f64>) -> Arc<dyn Function> {
        let nodes = Arc::clone(&self.nodes);
        Arc::new(LambdaFunction::new(1, move |x| {
            interpolation_weights(&nodes, x[0])
                .into_iter()
                .map(|(i, w)| w * values[i])
                .sum()
        }))
    }

    /// Hat function peaking at `node`; half-hats at the ends.
    pub(crate) fn hat(&self, node: usize) -> Arc<dyn Function> {
        let nodes = Arc::clone(&self.nodes);
        Arc::new(LambdaFunction::new(1, move |x| {
            interpolation_weights(&nodes, x[0])
                .into_iter()
                .find(|(i, _)| *i == node)
                .map_or(0.0, |(_, w)| w)
        }))
    }

    /// `Φ[j, i] = weight of node offset + i at x_j` for `columns` nodes.
    pub(crate) fn weight_matrix(
        &self,
        x: &DMatrix<f64>,
        offset: usize,
        columns: usize,
    ) -> Result<DMatrix<f64>> {
        check_points("basis observation points", 1, x)?;
        let mut out = DMatrix::zeros(x.nrows(), columns);
        for j in 0..x.nrows() {
            for (i, w) in self.weights(x[(j, 0)]) {
                if i >= offset && i < offset + columns {
                    out[(j, i - offset)] = w;
                }
            }
        }
        Ok(out)
    }
}

fn interpolation_weights(nodes: &[f64], x: f64) -> Vec<(usize, f64)> {
    let n = nodes.len();
    if n < 2 || x.is_nan() || x < nodes[0] || x > nodes[n - 1] {
        return Vec::new();
    }
    let k = nodes.partition_point(|g| *g <= x).clamp(1, n - 1) - 1;
    let t = (x - nodes[k]) / (nodes[k + 1] - nodes[k]);
    vec![(k, 1.0 - t), (k + 1, t)]
}

pub(crate) fn out_of_range(idx: usize, size: usize) -> Error {
    Error::InvalidArgument(format!("basis index {idx} out of range for size {size}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_at_nodes_and_between() {
        let nodes = [0.0, 0.5, 1.0];
        assert_eq!(interpolation_weights(&nodes, 0.5), vec![(1, 1.0), (2, 0.0)]);
        let w = interpolation_weights(&nodes, 0.25);
        assert_relative_eq!(w[0].1, 0.5);
        assert_relative_eq!(w[1].1, 0.5);
        assert_eq!(interpolation_weights(&nodes, 1.0), vec![(1, 0.0), (2, 1.0)]);
        assert!(interpolation_weights(&nodes, 1.1).is_empty());
    }
}
