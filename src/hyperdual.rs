//! Multivariate nilpotent numbers for exact higher-order derivatives.
//!
//! A [`HyperDual`] carries `2^m` coefficients, one per subset `S` of the
//! perturbation symbols `ε₀ … ε_{m-1}`:
//!
//! ```text
//! a = Σ_S a_S · Π_{i ∈ S} ε_i,     ε_i² = 0
//! ```
//!
//! Seeding one coordinate of `f`'s input with `q` distinct symbols and reading
//! the coefficient of their product yields the exact `q`-th partial derivative
//! of `f` along that coordinate. Seeding different coordinates with different
//! symbols gives the mixed partials.
//!
//! The number of symbols `m` is chosen at runtime. Operators therefore nest
//! freely: differentiating a function whose inputs already carry `m` symbols
//! allocates fresh symbols `m, m+1, …` and extracts over them, leaving the
//! outer `m` symbols untouched. This is what lets a kernel that was already
//! differentiated by one operator be differentiated again by another.
//!
//! # Representation
//!
//! Coefficient `i` belongs to the subset whose bit pattern is `i`, so
//! `coeffs[0]` is the primal value and `coeffs[1 << k]` is the first-order
//! tangent along `ε_k`. Numbers with fewer symbols are implicitly zero-padded
//! when combined with numbers carrying more.

use std::fmt::{self, Display};

/// Multivariate first-order-per-symbol nilpotent number.
///
/// `coeffs.len()` is always a power of two.
#[derive(Clone, Debug, PartialEq)]
pub struct HyperDual {
    coeffs: Vec<f64>,
}

impl Default for HyperDual {
    fn default() -> Self {
        HyperDual::constant(0.0)
    }
}

impl Display for HyperDual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coeffs[0])?;
        for (mask, c) in self.coeffs.iter().enumerate().skip(1) {
            if *c != 0.0 {
                write!(f, " + {}ε[{:#b}]", c, mask)?;
            }
        }
        Ok(())
    }
}

impl HyperDual {
    /// Create a constant (no perturbation symbols).
    #[inline]
    pub fn constant(value: f64) -> Self {
        HyperDual {
            coeffs: vec![value],
        }
    }

    /// Create `value + ε_bit`.
    pub fn variable(value: f64, bit: u32) -> Self {
        let mut coeffs = vec![0.0; 1 << (bit + 1)];
        coeffs[0] = value;
        coeffs[1 << bit] = 1.0;
        HyperDual { coeffs }
    }

    /// Build from raw subset coefficients.
    ///
    /// # Panics
    ///
    /// Panics if `coeffs.len()` is not a non-zero power of two.
    pub fn from_coeffs(coeffs: Vec<f64>) -> Self {
        assert!(
            coeffs.len().is_power_of_two(),
            "coefficient count must be a power of two, got {}",
            coeffs.len()
        );
        HyperDual { coeffs }
    }

    /// Number of perturbation symbols this number has storage for.
    #[inline]
    pub fn num_bits(&self) -> u32 {
        self.coeffs.len().trailing_zeros()
    }

    /// Primal value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.coeffs[0]
    }

    /// Coefficient of the monomial whose symbol set is `mask`.
    #[inline]
    pub fn coeff(&self, mask: usize) -> f64 {
        self.coeffs.get(mask).copied().unwrap_or(0.0)
    }

    /// All subset coefficients.
    #[inline]
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// True if no perturbation coefficient is non-zero.
    pub fn is_constant(&self) -> bool {
        self.coeffs[1..].iter().all(|c| *c == 0.0)
    }

    /// Zero-pad to storage for `bits` symbols. Never truncates.
    pub fn lift(&self, bits: u32) -> Self {
        let len = 1usize << bits;
        if len <= self.coeffs.len() {
            return self.clone();
        }
        let mut coeffs = self.coeffs.clone();
        coeffs.resize(len, 0.0);
        HyperDual { coeffs }
    }

    /// `self + Σ_{k ∈ symbols} ε_k`, stored with room for `bits` symbols.
    pub fn perturbed(&self, symbols: &[u32], bits: u32) -> Self {
        let mut out = self.lift(bits);
        for &k in symbols {
            out.coeffs[1 << k] += 1.0;
        }
        out
    }

    /// Collapse the symbols in `mask` (all above `base_bits`).
    ///
    /// Returns the number `Σ_{S ⊆ [0, base_bits)} a_{S ∪ mask} Π_{i∈S} ε_i`,
    /// i.e. the coefficient of `Π_{k ∈ mask} ε_k` as a function of the lower
    /// symbols.
    pub fn extract(&self, base_bits: u32, mask: usize) -> Self {
        let len = 1usize << base_bits;
        debug_assert_eq!(mask & (len - 1), 0, "mask overlaps base symbols");
        let coeffs = (0..len).map(|s| self.coeff(s | mask)).collect();
        HyperDual { coeffs }
    }

    // ── Chain rule ──

    /// Compose with a scalar function given its derivatives at the primal.
    ///
    /// `derivs[k] = f^(k)(a₀)`. With `a = a₀ + n` and `n` nilpotent,
    /// `f(a) = Σ_k derivs[k] / k! · nᵏ`; `nᵏ` vanishes for `k > num_bits`.
    fn chain(&self, derivs: &[f64]) -> Self {
        let m = self.num_bits() as usize;
        debug_assert!(derivs.len() > m);
        let mut out = vec![0.0; self.coeffs.len()];
        out[0] = derivs[0];
        if m == 0 {
            return HyperDual { coeffs: out };
        }

        let mut nil = self.coeffs.clone();
        nil[0] = 0.0;
        let mut power = nil.clone();
        let mut factorial = 1.0;
        for (k, d) in derivs.iter().enumerate().take(m + 1).skip(1) {
            factorial *= k as f64;
            let scale = d / factorial;
            for (o, p) in out.iter_mut().zip(power.iter()) {
                *o += scale * p;
            }
            if k < m {
                power = convolve(&power, &nil);
                if power.iter().all(|c| *c == 0.0) {
                    break;
                }
            }
        }
        HyperDual { coeffs: out }
    }

    // ── Powers ──

    pub fn recip(&self) -> Self {
        self.powi(-1)
    }

    pub fn sqrt(&self) -> Self {
        let mut derivs = falling_power(self.value(), 0.5, self.num_bits());
        derivs[0] = self.value().sqrt();
        self.chain(&derivs)
    }

    pub fn powi(&self, n: i32) -> Self {
        let mut derivs = falling_power(self.value(), n as f64, self.num_bits());
        derivs[0] = self.value().powi(n);
        self.chain(&derivs)
    }

    /// Power with a constant real exponent.
    pub fn powf(&self, n: f64) -> Self {
        self.chain(&falling_power(self.value(), n, self.num_bits()))
    }

    // ── Exp/Log ──

    pub fn exp(&self) -> Self {
        let e = self.value().exp();
        self.chain(&vec![e; self.num_bits() as usize + 1])
    }

    pub fn ln(&self) -> Self {
        let a0 = self.value();
        let m = self.num_bits() as usize;
        let mut derivs = Vec::with_capacity(m + 1);
        derivs.push(a0.ln());
        let mut fact = 1.0;
        for k in 1..=m {
            if k > 1 {
                fact *= (k - 1) as f64;
            }
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            derivs.push(sign * fact / a0.powi(k as i32));
        }
        self.chain(&derivs)
    }

    // ── Trig ──

    pub fn sin(&self) -> Self {
        let (s, c) = self.value().sin_cos();
        let cycle = [s, c, -s, -c];
        let derivs: Vec<f64> = (0..=self.num_bits() as usize).map(|k| cycle[k % 4]).collect();
        self.chain(&derivs)
    }

    pub fn cos(&self) -> Self {
        let (s, c) = self.value().sin_cos();
        let cycle = [c, -s, -c, s];
        let derivs: Vec<f64> = (0..=self.num_bits() as usize).map(|k| cycle[k % 4]).collect();
        self.chain(&derivs)
    }

    // ── Misc ──

    /// Absolute value, differentiated on the branch selected by the primal.
    pub fn abs(&self) -> Self {
        if self.value() < 0.0 {
            -self.clone()
        } else {
            self.clone()
        }
    }

    pub fn signum(&self) -> Self {
        HyperDual::constant(self.value().signum())
    }

    /// Multiply every coefficient by `s`.
    pub fn scale(&self, s: f64) -> Self {
        HyperDual {
            coeffs: self.coeffs.iter().map(|c| c * s).collect(),
        }
    }
}

/// `[x^n, n x^(n-1), n(n-1) x^(n-2), …]` up to order `m`.
fn falling_power(x: f64, n: f64, m: u32) -> Vec<f64> {
    let mut derivs = Vec::with_capacity(m as usize + 1);
    let mut coef = 1.0;
    for k in 0..=m {
        derivs.push(coef * x.powf(n - k as f64));
        coef *= n - k as f64;
    }
    derivs
}

/// Subset convolution: `c[S] = Σ_{T ⊆ S} a[T] · b[S \ T]`.
pub(crate) fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.len() == 1 {
        return b.iter().map(|x| a[0] * x).collect();
    }
    if b.len() == 1 {
        return a.iter().map(|x| x * b[0]).collect();
    }
    let n = a.len().max(b.len());
    let mut c = vec![0.0; n];
    for (s, slot) in c.iter_mut().enumerate() {
        let mut t = s;
        loop {
            let u = s ^ t;
            if t < a.len() && u < b.len() {
                *slot += a[t] * b[u];
            }
            if t == 0 {
                break;
            }
            t = (t - 1) & s;
        }
    }
    c
}

/// Element-wise combination with zero padding.
pub(crate) fn zip_padded(a: &[f64], b: &[f64], op: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let n = a.len().max(b.len());
    (0..n)
        .map(|i| {
            op(
                a.get(i).copied().unwrap_or(0.0),
                b.get(i).copied().unwrap_or(0.0),
            )
        })
        .collect()
}

impl HyperDual {
    pub(crate) fn from_raw(coeffs: Vec<f64>) -> Self {
        HyperDual { coeffs }
    }

    pub(crate) fn raw(&self) -> &[f64] {
        &self.coeffs
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [f64] {
        &mut self.coeffs
    }
}
