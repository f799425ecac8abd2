//! Linear differential operators evaluated with nilpotent seeding.
//!
//! A [`DiffOp`] is a linear differential operator `L = Σ C_α D^α` over the
//! coordinates of one function argument. It is applied to a function at
//! [`HyperDual`] inputs by seeding: for each term, every active coordinate
//! `i` of order `q_i` receives `q_i` fresh perturbation symbols, the function
//! is evaluated once, and the coefficient of the product of all fresh symbols
//! is the mixed partial `D^α f`.
//!
//! # Design
//!
//! - **Fresh symbols above the base**: the inputs may already carry `base`
//!   symbols from an outer operator (or from the other kernel argument).
//!   Fresh symbols start at `base`, so nested operators never collide and the
//!   result keeps the outer symbols intact.
//! - **Plan once, evaluate many**: [`SeedPlan`] precomputes the symbol
//!   assignment and extraction mask for a given base. [`PlanCache`] memoises
//!   plans per base, which is the call signature of a differentiable
//!   evaluation. Repeated evaluations reuse the cached plan.
//! - **Validated upstream**: operators are built from known dimensions; checks
//!   against user input happen in the operator layer and return errors.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::hyperdual::HyperDual;

/// Differentiation orders of one term, kept per active coordinate.
///
/// Coordinates are listed in ascending order and carry a nonzero order, so
/// two indices for the same partial compare equal however they were built.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MultiIndex {
    num_vars: usize,
    active: Vec<(usize, u8)>,
}

impl MultiIndex {
    /// `orders[i]` is the order in coordinate `i`.
    pub fn new(orders: &[u8]) -> Self {
        MultiIndex {
            num_vars: orders.len(),
            active: orders
                .iter()
                .copied()
                .enumerate()
                .filter(|&(_, q)| q > 0)
                .collect(),
        }
    }

    /// `∂^order / ∂x_var^order` among `num_vars` coordinates.
    pub fn pure(num_vars: usize, var: usize, order: u8) -> Self {
        debug_assert!(var < num_vars);
        MultiIndex {
            num_vars,
            active: if order > 0 { vec![(var, order)] } else { Vec::new() },
        }
    }

    fn zero(num_vars: usize) -> Self {
        MultiIndex {
            num_vars,
            active: Vec::new(),
        }
    }

    /// Number of fresh symbols a seeding of this term consumes.
    pub fn total_order(&self) -> usize {
        self.active.iter().map(|&(_, q)| q as usize).sum()
    }

    pub fn active_vars(&self) -> &[(usize, u8)] {
        &self.active
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    fn shifted(&self, offset: usize, total: usize) -> Self {
        debug_assert!(offset + self.num_vars <= total);
        MultiIndex {
            num_vars: total,
            active: self.active.iter().map(|&(i, q)| (i + offset, q)).collect(),
        }
    }
}

// ══════════════════════════════════════════════
//  DiffOp: differential operator type
// ══════════════════════════════════════════════

/// A linear differential operator `L = Σ C_α D^α`.
///
/// Each term is a `(coefficient, multi-index)` pair. Terms with equal
/// multi-indices are merged on construction.
///
/// ```
/// use linpde_gp::diffop::DiffOp;
///
/// // ∂/∂t − Δₓ on (t, x, y)
/// let heat = DiffOp::heat(3, 1.0);
/// assert_eq!(heat.terms().len(), 3);
/// assert_eq!(heat.order(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DiffOp {
    terms: Vec<(f64, MultiIndex)>,
    num_vars: usize,
}

impl DiffOp {
    /// Create a differential operator from explicit `(coefficient, multi-index)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if `terms` is empty or any multi-index has wrong `num_vars`.
    pub fn new(num_vars: usize, terms: Vec<(f64, MultiIndex)>) -> Self {
        assert!(!terms.is_empty(), "DiffOp must have at least one term");
        for (_, mi) in &terms {
            assert_eq!(
                mi.num_vars(),
                num_vars,
                "multi-index num_vars ({}) != expected ({})",
                mi.num_vars(),
                num_vars
            );
        }
        let mut op = DiffOp {
            terms: Vec::with_capacity(terms.len()),
            num_vars,
        };
        for (c, mi) in terms {
            op.push_term(c, mi);
        }
        op
    }

    fn push_term(&mut self, c: f64, mi: MultiIndex) {
        if let Some(entry) = self.terms.iter_mut().find(|(_, m)| *m == mi) {
            entry.0 += c;
        } else {
            self.terms.push((c, mi));
        }
    }

    /// Identity: the zero-order term with coefficient 1.
    pub fn identity(n: usize) -> Self {
        DiffOp {
            terms: vec![(1.0, MultiIndex::zero(n))],
            num_vars: n,
        }
    }

    /// First partial `∂/∂x_var`.
    pub fn partial(n: usize, var: usize) -> Self {
        DiffOp {
            terms: vec![(1.0, MultiIndex::pure(n, var, 1))],
            num_vars: n,
        }
    }

    /// Laplacian: `Σ_j ∂²/∂x_j²`.
    pub fn laplacian(n: usize) -> Self {
        Self::scaled_laplacian(n, 1.0)
    }

    /// Scaled Laplacian: `α Σ_j ∂²/∂x_j²`.
    pub fn scaled_laplacian(n: usize, alpha: f64) -> Self {
        let terms = (0..n)
            .map(|j| (alpha, MultiIndex::pure(n, j, 2)))
            .collect();
        DiffOp { terms, num_vars: n }
    }

    /// Directional derivative `Σ_j v_j ∂/∂x_j`; zero components are dropped.
    pub fn directional_derivative(direction: &[f64]) -> Self {
        let n = direction.len();
        let mut terms: Vec<(f64, MultiIndex)> = direction
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(j, &v)| (v, MultiIndex::pure(n, j, 1)))
            .collect();
        if terms.is_empty() {
            terms.push((0.0, MultiIndex::pure(n, 0, 1)));
        }
        DiffOp { terms, num_vars: n }
    }

    /// Heat operator on concatenated `(t, x)`: `∂/∂t − α Σ_{j≥1} ∂²/∂x_j²`.
    ///
    /// # Panics
    ///
    /// Panics if `n < 2` (no spatial coordinate).
    pub fn heat(n: usize, alpha: f64) -> Self {
        assert!(n >= 2, "heat operator needs a time and a space coordinate");
        Self::partial(n, 0).sub(&Self::scaled_laplacian(n - 1, alpha).shifted(1, n))
    }

    /// Embed an operator on `num_vars` coordinates into `total` coordinates
    /// starting at `offset`.
    pub fn shifted(&self, offset: usize, total: usize) -> Self {
        DiffOp {
            terms: self
                .terms
                .iter()
                .map(|(c, mi)| (*c, mi.shifted(offset, total)))
                .collect(),
            num_vars: total,
        }
    }

    /// `c · L`.
    pub fn scale(&self, c: f64) -> Self {
        DiffOp {
            terms: self.terms.iter().map(|(a, mi)| (a * c, mi.clone())).collect(),
            num_vars: self.num_vars,
        }
    }

    /// `L + M`.
    ///
    /// # Panics
    ///
    /// Panics if the operators act on different numbers of variables.
    pub fn add(&self, other: &DiffOp) -> Self {
        assert_eq!(self.num_vars, other.num_vars, "DiffOp dimension mismatch");
        let mut out = self.clone();
        for (c, mi) in &other.terms {
            out.push_term(*c, mi.clone());
        }
        out
    }

    /// `L − M`.
    pub fn sub(&self, other: &DiffOp) -> Self {
        self.add(&other.scale(-1.0))
    }

    /// The terms of the operator.
    pub fn terms(&self) -> &[(f64, MultiIndex)] {
        &self.terms
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Maximum total order across all terms.
    pub fn order(&self) -> usize {
        self.terms
            .iter()
            .map(|(_, mi)| mi.total_order())
            .max()
            .unwrap_or(0)
    }

    /// Evaluate `(L f)(x)` without a cache.
    pub fn apply(
        &self,
        base_bits: u32,
        x: &[HyperDual],
        f: impl Fn(&[HyperDual]) -> HyperDual,
    ) -> HyperDual {
        SeedPlan::new(self, base_bits).apply(x, f)
    }
}

// ══════════════════════════════════════════════
//  SeedPlan
// ══════════════════════════════════════════════

/// Per-term seeding: which fresh symbols each active variable receives.
#[derive(Clone, Debug)]
struct SeedTerm {
    coeff: f64,
    /// `(variable, fresh symbols)` for each active variable.
    seeds: Vec<(usize, Vec<u32>)>,
    /// Union of the fresh symbols, read out of the result.
    mask: usize,
    /// Storage needed for this term's inputs.
    bits: u32,
}

/// Immutable seeding plan for one operator at one base symbol count.
#[derive(Clone, Debug)]
pub struct SeedPlan {
    base_bits: u32,
    num_vars: usize,
    terms: Vec<SeedTerm>,
}

impl SeedPlan {
    /// Assign fresh symbols `base_bits, base_bits + 1, …` to every term.
    pub fn new(op: &DiffOp, base_bits: u32) -> Self {
        let terms = op
            .terms()
            .iter()
            .filter(|(c, _)| *c != 0.0)
            .map(|(c, mi)| {
                let mut next = base_bits;
                let mut mask = 0usize;
                let seeds = mi
                    .active_vars()
                    .iter()
                    .map(|&(var, order)| {
                        let symbols: Vec<u32> = (0..order as u32).map(|k| next + k).collect();
                        for &s in &symbols {
                            mask |= 1 << s;
                        }
                        next += order as u32;
                        (var, symbols)
                    })
                    .collect();
                SeedTerm {
                    coeff: *c,
                    seeds,
                    mask,
                    bits: next,
                }
            })
            .collect();
        SeedPlan {
            base_bits,
            num_vars: op.num_vars(),
            terms,
        }
    }

    /// Number of symbols the inputs may carry.
    pub fn base_bits(&self) -> u32 {
        self.base_bits
    }

    /// Evaluate `Σ c_α · (D^α f)(x)`.
    ///
    /// # Panics
    ///
    /// Panics if `x.len()` differs from the operator's variable count.
    pub fn apply(&self, x: &[HyperDual], f: impl Fn(&[HyperDual]) -> HyperDual) -> HyperDual {
        match self.try_apply::<Infallible>(x, |xs| Ok(f(xs))) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Like [`SeedPlan::apply`] for a fallible `f`; stops at the first error.
    pub fn try_apply<E>(
        &self,
        x: &[HyperDual],
        f: impl Fn(&[HyperDual]) -> Result<HyperDual, E>,
    ) -> Result<HyperDual, E> {
        assert_eq!(
            x.len(),
            self.num_vars,
            "input length {} != operator variables {}",
            x.len(),
            self.num_vars
        );
        let mut total = HyperDual::constant(0.0).lift(self.base_bits);
        for term in &self.terms {
            let mut seeded: Vec<HyperDual> = x.to_vec();
            for (var, symbols) in &term.seeds {
                seeded[*var] = x[*var].perturbed(symbols, term.bits);
            }
            let out = f(&seeded)?;
            let part = out.extract(self.base_bits, term.mask);
            total += &(part * term.coeff);
        }
        Ok(total)
    }

    /// [`SeedPlan::try_apply`] for a vector-valued `f` of fixed length `len`,
    /// applied to every component with one evaluation per term.
    pub fn try_apply_many<E>(
        &self,
        x: &[HyperDual],
        len: usize,
        f: impl Fn(&[HyperDual]) -> Result<Vec<HyperDual>, E>,
    ) -> Result<Vec<HyperDual>, E> {
        assert_eq!(
            x.len(),
            self.num_vars,
            "input length {} != operator variables {}",
            x.len(),
            self.num_vars
        );
        let mut totals = vec![HyperDual::constant(0.0).lift(self.base_bits); len];
        for term in &self.terms {
            let mut seeded: Vec<HyperDual> = x.to_vec();
            for (var, symbols) in &term.seeds {
                seeded[*var] = x[*var].perturbed(symbols, term.bits);
            }
            let outs = f(&seeded)?;
            debug_assert_eq!(outs.len(), len);
            for (total, out) in totals.iter_mut().zip(&outs) {
                *total += &(out.extract(self.base_bits, term.mask) * term.coeff);
            }
        }
        Ok(totals)
    }
}

// ══════════════════════════════════════════════
//  PlanCache
// ══════════════════════════════════════════════

/// An operator together with its seeding plans, memoised by base symbol count.
#[derive(Debug)]
pub struct PlanCache {
    op: DiffOp,
    plans: RwLock<HashMap<u32, Arc<SeedPlan>>>,
}

impl Clone for PlanCache {
    fn clone(&self) -> Self {
        PlanCache::new(self.op.clone())
    }
}

impl PlanCache {
    pub fn new(op: DiffOp) -> Self {
        PlanCache {
            op,
            plans: RwLock::new(HashMap::new()),
        }
    }

    pub fn op(&self) -> &DiffOp {
        &self.op
    }

    /// Fetch the plan for `base_bits`, building it on first use.
    pub fn plan(&self, base_bits: u32) -> Arc<SeedPlan> {
        if let Some(plan) = self
            .plans
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&base_bits)
        {
            return Arc::clone(plan);
        }
        let mut plans = self.plans.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(plans.entry(base_bits).or_insert_with(|| {
            debug!(base_bits, terms = self.op.terms().len(), "building seed plan");
            Arc::new(SeedPlan::new(&self.op, base_bits))
        }))
    }

    /// Number of distinct call signatures seen so far.
    pub fn cached_signatures(&self) -> usize {
        self.plans.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Evaluate `(L f)(x)` with the cached plan for `base_bits`.
    pub fn apply(
        &self,
        base_bits: u32,
        x: &[HyperDual],
        f: impl Fn(&[HyperDual]) -> HyperDual,
    ) -> HyperDual {
        self.plan(base_bits).apply(x, f)
    }

    /// Fallible variant of [`PlanCache::apply`].
    pub fn try_apply<E>(
        &self,
        base_bits: u32,
        x: &[HyperDual],
        f: impl Fn(&[HyperDual]) -> Result<HyperDual, E>,
    ) -> Result<HyperDual, E> {
        self.plan(base_bits).try_apply(x, f)
    }

    /// Vector-valued variant of [`PlanCache::try_apply`].
    pub fn try_apply_many<E>(
        &self,
        base_bits: u32,
        x: &[HyperDual],
        len: usize,
        f: impl Fn(&[HyperDual]) -> Result<Vec<HyperDual>, E>,
    ) -> Result<Vec<HyperDual>, E> {
        self.plan(base_bits).try_apply_many(x, len, f)
    }
}

/// Largest symbol count across several input slices.
pub fn max_bits<'a>(inputs: impl IntoIterator<Item = &'a [HyperDual]>) -> u32 {
    inputs
        .into_iter()
        .flat_map(|xs| xs.iter())
        .map(HyperDual::num_bits)
        .max()
        .unwrap_or(0)
}

/// Lift plain coordinates to constant [`HyperDual`]s.
pub fn constants(x: &[f64]) -> Vec<HyperDual> {
    x.iter().map(|&v| HyperDual::constant(v)).collect()
}
