//! nalgebra adapters for point batches and block matrices.
//!
//! Point batches are `DMatrix<f64>` with one point per row. nalgebra stores
//! matrices column-major, so rows are copied out into contiguous `Vec<f64>`
//! before they are handed to kernels.

use nalgebra::{DMatrix, DVector};

use crate::error::{check_dim, Result};

/// Copy every row of `x` into its own vector.
pub fn rows(x: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..x.nrows())
        .map(|i| x.row(i).iter().copied().collect())
        .collect()
}

/// Stack points of equal dimension into an `n × d` matrix.
pub fn points_from_rows(points: &[Vec<f64>]) -> DMatrix<f64> {
    let d = points.first().map_or(0, Vec::len);
    DMatrix::from_fn(points.len(), d, |i, j| points[i][j])
}

/// One-dimensional points (`n × 1`) from a slice of coordinates.
pub fn column_points(xs: &[f64]) -> DMatrix<f64> {
    DMatrix::from_column_slice(xs.len(), 1, xs)
}

/// `n` evenly spaced values from `lower` to `upper` inclusive.
pub fn linspace(lower: f64, upper: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lower],
        _ => {
            let step = (upper - lower) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { upper } else { lower + step * i as f64 })
                .collect()
        }
    }
}

/// Check that a point batch has `expected` columns.
pub(crate) fn check_points(context: &str, expected: usize, x: &DMatrix<f64>) -> Result<()> {
    check_dim(context, expected, x.ncols())
}

/// Block-diagonal matrix from square blocks.
pub fn block_diag(blocks: &[DMatrix<f64>]) -> DMatrix<f64> {
    let n: usize = blocks.iter().map(DMatrix::nrows).sum();
    let mut out = DMatrix::zeros(n, n);
    let mut offset = 0;
    for b in blocks {
        out.view_mut((offset, offset), (b.nrows(), b.ncols()))
            .copy_from(b);
        offset += b.nrows();
    }
    out
}

/// Concatenate vectors end to end.
pub fn concat_vectors(parts: &[DVector<f64>]) -> DVector<f64> {
    let data: Vec<f64> = parts.iter().flat_map(|v| v.iter().copied()).collect();
    DVector::from_vec(data)
}

/// Split `n` rows into consecutive chunks of the given sizes.
pub fn split_rows(x: &DMatrix<f64>, sizes: &[usize]) -> Vec<DMatrix<f64>> {
    let mut offset = 0;
    sizes
        .iter()
        .map(|&s| {
            let block = x.rows(offset, s).into_owned();
            offset += s;
            block
        })
        .collect()
}

/// Split a vector into consecutive chunks of the given sizes.
pub fn split_vector(v: &DVector<f64>, sizes: &[usize]) -> Vec<DVector<f64>> {
    let mut offset = 0;
    sizes
        .iter()
        .map(|&s| {
            let block = v.rows(offset, s).into_owned();
            offset += s;
            block
        })
        .collect()
}
