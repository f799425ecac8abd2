use crate::diffop::{constants, DiffOp};
use crate::hyperdual::HyperDual;

/// `order`-th derivative of a scalar function `f : R → R` at `x`.
///
/// ```
/// use linpde_gp::HyperDual;
///
/// let d3 = linpde_gp::api::derivative(|x: HyperDual| x.powi(4), 2.0, 3);
/// assert!((d3 - 48.0).abs() < 1e-10);
/// ```
pub fn derivative(f: impl Fn(HyperDual) -> HyperDual, x: f64, order: u8) -> f64 {
    let symbols: Vec<u32> = (0..order as u32).collect();
    let seeded = HyperDual::constant(x).perturbed(&symbols, order as u32);
    f(seeded).coeff((1usize << order) - 1)
}

/// Gradient of `f : R^n → R`, one single-symbol evaluation per coordinate.
///
/// ```
/// use linpde_gp::HyperDual;
///
/// let g = linpde_gp::api::gradient(|x: &[HyperDual]| &x[0] * &x[0] + &x[1] * 3.0, &[3.0, 4.0]);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 3.0).abs() < 1e-10);
/// ```
pub fn gradient(f: impl Fn(&[HyperDual]) -> HyperDual, x: &[f64]) -> Vec<f64> {
    let base = constants(x);
    (0..x.len())
        .map(|i| {
            let mut seeded = base.clone();
            seeded[i] = HyperDual::variable(x[i], 0);
            f(&seeded).coeff(1)
        })
        .collect()
}

/// `vᵀ ∇f(x)` from a single evaluation.
///
/// # Panics
///
/// Panics if `x` and `v` differ in length.
pub fn directional_derivative(
    f: impl Fn(&[HyperDual]) -> HyperDual,
    x: &[f64],
    v: &[f64],
) -> f64 {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let seeded: Vec<HyperDual> = x
        .iter()
        .zip(v)
        .map(|(&xi, &vi)| HyperDual::from_coeffs(vec![xi, vi]))
        .collect();
    f(&seeded).coeff(1)
}

/// `Σ_i ∂²f/∂x_i²` at `x`.
pub fn laplacian(f: impl Fn(&[HyperDual]) -> HyperDual, x: &[f64]) -> f64 {
    DiffOp::laplacian(x.len())
        .apply(0, &constants(x), f)
        .value()
}

/// Dense Hessian of `f : R^n → R`, row-major.
pub fn hessian(f: impl Fn(&[HyperDual]) -> HyperDual, x: &[f64]) -> Vec<Vec<f64>> {
    let n = x.len();
    let base = constants(x);
    let mut h = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let mut seeded = base.clone();
            if i == j {
                seeded[i] = base[i].perturbed(&[0, 1], 2);
            } else {
                seeded[i] = base[i].perturbed(&[0], 2);
                seeded[j] = base[j].perturbed(&[1], 2);
            }
            let hij = f(&seeded).coeff(0b11);
            h[i][j] = hij;
            h[j][i] = hij;
        }
    }
    h
}
