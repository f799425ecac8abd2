//! Operator × target dispatch.
//!
//! Rules are keyed by `(operator type or any operator, target type)`, one
//! table per target family. Resolution tries the exact operator rule, then the
//! any-operator rule, then the single automatic-differentiation fallback. A
//! rule returning `None` declines. Rules are cloned out of the table before
//! they run, so a rule may dispatch recursively.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockWriteGuard};

use tracing::trace;

use crate::crosscov::{
    scale, KernelDiracIdentity, KernelIdentityDirac, ProcessVectorCrossCovariance,
    ScaledProcessVectorCrossCovariance, TransformedCrossCovariance,
};
use crate::error::{check_argnum, Error, Result};
use crate::functions::{Function, TransformedFunction, ZeroFunction};
use crate::kernels::{
    Kernel, ProductMatern, ProductMaternDirectionalDerivativeLaplacian,
    ProductMaternIdentityDirectionalDerivative, ProductMaternIdentityLaplacian,
    ProductMaternLaplacianLaplacian, TransformedKernel,
};
use crate::linfuncops::{DirectionalDerivative, Identity, Laplacian, LinearFunctionOperator};

type FunctionRule = Arc<
    dyn Fn(&dyn LinearFunctionOperator, &dyn Function) -> Option<Result<Arc<dyn Function>>>
        + Send
        + Sync,
>;
type KernelRule = Arc<
    dyn Fn(&dyn LinearFunctionOperator, &dyn Kernel, usize) -> Option<Result<Arc<dyn Kernel>>>
        + Send
        + Sync,
>;
type CrossCovRule = Arc<
    dyn Fn(
            &dyn LinearFunctionOperator,
            &dyn ProcessVectorCrossCovariance,
        ) -> Option<Result<Arc<dyn ProcessVectorCrossCovariance>>>
        + Send
        + Sync,
>;

/// Operator half of a rule key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum OperatorKey {
    Any,
    Exact(TypeId),
}

type RuleKey = (OperatorKey, TypeId);

#[derive(Default)]
struct Registry {
    functions: HashMap<RuleKey, FunctionRule>,
    kernels: HashMap<RuleKey, KernelRule>,
    crosscovs: HashMap<RuleKey, CrossCovRule>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::with_builtins()))
}

/// Exact rule first, then the any-operator rule.
fn candidates<R: Clone>(
    table: impl Fn(&Registry) -> &HashMap<RuleKey, R>,
    op: &dyn LinearFunctionOperator,
    target: TypeId,
) -> Vec<R> {
    let reg = registry().read().unwrap_or_else(|e| e.into_inner());
    let rules = table(&reg);
    let op_type = Any::type_id(op.as_any());
    [OperatorKey::Exact(op_type), OperatorKey::Any]
        .iter()
        .filter_map(|key| rules.get(&(*key, target)).cloned())
        .collect()
}

fn is_identity(op: &dyn LinearFunctionOperator) -> bool {
    op.as_any().is::<Identity>()
}

fn not_implemented(op: &dyn LinearFunctionOperator, target: &'static str) -> Error {
    Error::NotImplemented {
        operator: op.name().to_string(),
        target,
    }
}

// ══════════════════════════════════════════════
//  Entry points
// ══════════════════════════════════════════════

/// `L f`.
pub fn apply_to_function(
    op: &dyn LinearFunctionOperator,
    f: Arc<dyn Function>,
) -> Result<Arc<dyn Function>> {
    if is_identity(op) {
        return Ok(f);
    }
    for rule in candidates(|r| &r.functions, op, Any::type_id(f.as_any())) {
        if let Some(result) = rule(op, f.as_ref()) {
            trace!(operator = op.name(), target = f.name(), "specialized function rule");
            return result;
        }
    }
    trace!(operator = op.name(), target = f.name(), "function AD fallback");
    if !f.is_differentiable() {
        return Err(not_implemented(op, f.name()));
    }
    let diffop = op.diffop(f.input_dim())?;
    Ok(Arc::new(TransformedFunction::new(f, op.name(), diffop)?))
}

/// `L` applied to argument `argnum` of `k`.
pub fn apply_to_kernel(
    op: &dyn LinearFunctionOperator,
    k: Arc<dyn Kernel>,
    argnum: usize,
) -> Result<Arc<dyn Kernel>> {
    check_argnum(argnum)?;
    if is_identity(op) {
        return Ok(k);
    }
    for rule in candidates(|r| &r.kernels, op, Any::type_id(k.as_any())) {
        if let Some(result) = rule(op, k.as_ref(), argnum) {
            trace!(operator = op.name(), target = k.name(), argnum, "specialized kernel rule");
            return result;
        }
    }
    trace!(operator = op.name(), target = k.name(), argnum, "kernel AD fallback");
    if !k.is_differentiable() {
        return Err(not_implemented(op, k.name()));
    }
    let diffop = op.diffop(k.input_dim())?;
    Ok(Arc::new(TransformedKernel::new(k, op.name(), diffop, argnum)?))
}

/// `L` applied to the process argument of a cross-covariance.
pub fn apply_to_crosscov(
    op: &dyn LinearFunctionOperator,
    cc: Arc<dyn ProcessVectorCrossCovariance>,
) -> Result<Arc<dyn ProcessVectorCrossCovariance>> {
    if is_identity(op) {
        return Ok(cc);
    }
    for rule in candidates(|r| &r.crosscovs, op, Any::type_id(cc.as_any())) {
        if let Some(result) = rule(op, cc.as_ref()) {
            trace!(operator = op.name(), target = cc.name(), "specialized cross-covariance rule");
            return result;
        }
    }
    trace!(operator = op.name(), target = cc.name(), "cross-covariance AD fallback");
    if !cc.is_differentiable() {
        return Err(not_implemented(op, cc.name()));
    }
    let diffop = op.diffop(cc.input_dim())?;
    Ok(Arc::new(TransformedCrossCovariance::new(cc, op.name(), diffop)?))
}

// ══════════════════════════════════════════════
//  Registration
// ══════════════════════════════════════════════

/// Register a function rule for operator `O` on target `F`, replacing any
/// previous rule for the pair.
pub fn register_function_rule<O, F>(
    rule: impl Fn(&O, &F) -> Option<Result<Arc<dyn Function>>> + Send + Sync + 'static,
) where
    O: LinearFunctionOperator + 'static,
    F: Function + 'static,
{
    let erased = function_rule(move |op, f| {
        let op = op.as_any().downcast_ref::<O>()?;
        let f = f.as_any().downcast_ref::<F>()?;
        rule(op, f)
    });
    let key = (OperatorKey::Exact(TypeId::of::<O>()), TypeId::of::<F>());
    write_registry().functions.insert(key, erased);
}

/// Register a function rule applying to every operator.
pub fn register_any_operator_function_rule<F>(
    rule: impl Fn(&dyn LinearFunctionOperator, &F) -> Option<Result<Arc<dyn Function>>>
        + Send
        + Sync
        + 'static,
) where
    F: Function + 'static,
{
    let erased = function_rule(move |op, f| rule(op, f.as_any().downcast_ref::<F>()?));
    write_registry()
        .functions
        .insert((OperatorKey::Any, TypeId::of::<F>()), erased);
}

/// Register a kernel rule for operator `O` on kernel `K`.
pub fn register_kernel_rule<O, K>(
    rule: impl Fn(&O, &K, usize) -> Option<Result<Arc<dyn Kernel>>> + Send + Sync + 'static,
) where
    O: LinearFunctionOperator + 'static,
    K: Kernel + 'static,
{
    let erased = kernel_rule(move |op, k, argnum| {
        let op = op.as_any().downcast_ref::<O>()?;
        let k = k.as_any().downcast_ref::<K>()?;
        rule(op, k, argnum)
    });
    let key = (OperatorKey::Exact(TypeId::of::<O>()), TypeId::of::<K>());
    write_registry().kernels.insert(key, erased);
}

/// Register a kernel rule applying to every operator.
pub fn register_any_operator_kernel_rule<K>(
    rule: impl Fn(&dyn LinearFunctionOperator, &K, usize) -> Option<Result<Arc<dyn Kernel>>>
        + Send
        + Sync
        + 'static,
) where
    K: Kernel + 'static,
{
    let erased = kernel_rule(move |op, k, argnum| rule(op, k.as_any().downcast_ref::<K>()?, argnum));
    write_registry()
        .kernels
        .insert((OperatorKey::Any, TypeId::of::<K>()), erased);
}

/// Register a cross-covariance rule for operator `O` on target `C`.
pub fn register_crosscov_rule<O, C>(
    rule: impl Fn(&O, &C) -> Option<Result<Arc<dyn ProcessVectorCrossCovariance>>>
        + Send
        + Sync
        + 'static,
) where
    O: LinearFunctionOperator + 'static,
    C: ProcessVectorCrossCovariance + 'static,
{
    let erased = crosscov_rule(move |op, cc| {
        let op = op.as_any().downcast_ref::<O>()?;
        let cc = cc.as_any().downcast_ref::<C>()?;
        rule(op, cc)
    });
    let key = (OperatorKey::Exact(TypeId::of::<O>()), TypeId::of::<C>());
    write_registry().crosscovs.insert(key, erased);
}

/// Register a cross-covariance rule applying to every operator.
pub fn register_any_operator_crosscov_rule<C>(
    rule: impl Fn(&dyn LinearFunctionOperator, &C) -> Option<Result<Arc<dyn ProcessVectorCrossCovariance>>>
        + Send
        + Sync
        + 'static,
) where
    C: ProcessVectorCrossCovariance + 'static,
{
    let erased = crosscov_rule(move |op, cc| rule(op, cc.as_any().downcast_ref::<C>()?));
    write_registry()
        .crosscovs
        .insert((OperatorKey::Any, TypeId::of::<C>()), erased);
}

fn write_registry() -> RwLockWriteGuard<'static, Registry> {
    registry().write().unwrap_or_else(|e| e.into_inner())
}

fn function_rule(
    rule: impl Fn(&dyn LinearFunctionOperator, &dyn Function) -> Option<Result<Arc<dyn Function>>>
        + Send
        + Sync
        + 'static,
) -> FunctionRule {
    Arc::new(rule)
}

fn kernel_rule(
    rule: impl Fn(&dyn LinearFunctionOperator, &dyn Kernel, usize) -> Option<Result<Arc<dyn Kernel>>>
        + Send
        + Sync
        + 'static,
) -> KernelRule {
    Arc::new(rule)
}

fn crosscov_rule(
    rule: impl Fn(
            &dyn LinearFunctionOperator,
            &dyn ProcessVectorCrossCovariance,
        ) -> Option<Result<Arc<dyn ProcessVectorCrossCovariance>>>
        + Send
        + Sync
        + 'static,
) -> CrossCovRule {
    Arc::new(rule)
}

// ══════════════════════════════════════════════
//  Built-in rules
// ══════════════════════════════════════════════

/// Whether `argnum` is the argument a one-sided closed form left free.
fn is_free_side(reverse: bool, argnum: usize) -> bool {
    (argnum == 0) != reverse
}

fn arc_kernel<K: Kernel + 'static>(k: K) -> Arc<dyn Kernel> {
    Arc::new(k)
}

impl Registry {
    fn with_builtins() -> Self {
        let mut reg = Registry::default();
        reg.insert_kernel::<Laplacian, ProductMatern>(|_, k, argnum| {
            Some(ProductMaternIdentityLaplacian::new(Arc::new(k.clone()), argnum == 0).map(arc_kernel))
        });
        reg.insert_kernel::<DirectionalDerivative, ProductMatern>(|op, k, argnum| {
            Some(
                ProductMaternIdentityDirectionalDerivative::new(
                    Arc::new(k.clone()),
                    op.direction().to_vec(),
                    argnum == 0,
                )
                .map(arc_kernel),
            )
        });
        reg.insert_kernel::<Laplacian, ProductMaternIdentityLaplacian>(|_, k, argnum| {
            is_free_side(k.reverse(), argnum).then(|| {
                ProductMaternLaplacianLaplacian::new(Arc::clone(k.matern())).map(arc_kernel)
            })
        });
        reg.insert_kernel::<DirectionalDerivative, ProductMaternIdentityLaplacian>(
            |op, k, argnum| {
                is_free_side(k.reverse(), argnum).then(|| {
                    ProductMaternDirectionalDerivativeLaplacian::new(
                        Arc::clone(k.matern()),
                        op.direction().to_vec(),
                        argnum == 1,
                    )
                    .map(arc_kernel)
                })
            },
        );
        reg.insert_kernel::<Laplacian, ProductMaternIdentityDirectionalDerivative>(
            |_, k, argnum| {
                is_free_side(k.reverse(), argnum).then(|| {
                    ProductMaternDirectionalDerivativeLaplacian::new(
                        Arc::clone(k.matern()),
                        k.direction().to_vec(),
                        argnum == 0,
                    )
                    .map(arc_kernel)
                })
            },
        );

        let zero = function_rule(|op, f| {
            let zero = f.as_any().downcast_ref::<ZeroFunction>()?;
            Some(
                op.diffop(zero.input_dim())
                    .map(|_| Arc::new(zero.clone()) as Arc<dyn Function>),
            )
        });
        reg.functions
            .insert((OperatorKey::Any, TypeId::of::<ZeroFunction>()), zero);

        let scaled = crosscov_rule(|op, cc| {
            let cc = cc.as_any().downcast_ref::<ScaledProcessVectorCrossCovariance>()?;
            Some(apply_to_crosscov(op, Arc::clone(cc.inner())).map(|inner| scale(inner, cc.scalar())))
        });
        let identity_dirac = crosscov_rule(|op, cc| {
            let cc = cc.as_any().downcast_ref::<KernelIdentityDirac>()?;
            Some(
                apply_to_kernel(op, Arc::clone(cc.kernel()), 0)
                    .and_then(|k| KernelIdentityDirac::new(k, cc.points().clone()))
                    .map(|cc| Arc::new(cc) as Arc<dyn ProcessVectorCrossCovariance>),
            )
        });
        let dirac_identity = crosscov_rule(|op, cc| {
            let cc = cc.as_any().downcast_ref::<KernelDiracIdentity>()?;
            Some(
                apply_to_kernel(op, Arc::clone(cc.kernel()), 1)
                    .and_then(|k| KernelDiracIdentity::new(k, cc.points().clone()))
                    .map(|cc| Arc::new(cc) as Arc<dyn ProcessVectorCrossCovariance>),
            )
        });
        for (target, rule) in [
            (TypeId::of::<ScaledProcessVectorCrossCovariance>(), scaled),
            (TypeId::of::<KernelIdentityDirac>(), identity_dirac),
            (TypeId::of::<KernelDiracIdentity>(), dirac_identity),
        ] {
            reg.crosscovs.insert((OperatorKey::Any, target), rule);
        }
        reg
    }

    fn insert_kernel<O, K>(
        &mut self,
        rule: impl Fn(&O, &K, usize) -> Option<Result<Arc<dyn Kernel>>> + Send + Sync + 'static,
    ) where
        O: LinearFunctionOperator + 'static,
        K: Kernel + 'static,
    {
        let erased = kernel_rule(move |op, k, argnum| {
            let op = op.as_any().downcast_ref::<O>()?;
            let k = k.as_any().downcast_ref::<K>()?;
            rule(op, k, argnum)
        });
        self.kernels
            .insert((OperatorKey::Exact(TypeId::of::<O>()), TypeId::of::<K>()), erased);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::ExpQuad;
    use crate::linfuncops::ScaledLaplacian;

    #[test]
    fn laplacian_of_matern_is_specialized() {
        let k: Arc<dyn Kernel> = Arc::new(ProductMatern::isotropic(2, 0.5, 3).unwrap());
        let lk = apply_to_kernel(&Laplacian, k, 1).unwrap();
        let lk = lk
            .as_any()
            .downcast_ref::<ProductMaternIdentityLaplacian>()
            .unwrap();
        assert!(!lk.reverse());
    }

    #[test]
    fn same_side_falls_back() {
        let k: Arc<dyn Kernel> = Arc::new(ProductMatern::isotropic(1, 0.5, 3).unwrap());
        let lk = apply_to_kernel(&Laplacian, k, 1).unwrap();
        let llk = apply_to_kernel(&Laplacian, lk, 1).unwrap();
        assert!(llk.as_any().is::<TransformedKernel>());
    }

    #[test]
    fn scaled_laplacian_of_expquad_uses_ad() {
        let k: Arc<dyn Kernel> = Arc::new(ExpQuad::new(1, 0.5, 1.0).unwrap());
        let lk = apply_to_kernel(&ScaledLaplacian::new(2.0), k, 0).unwrap();
        assert!(lk.as_any().is::<TransformedKernel>());
    }

    #[test]
    fn identity_is_short_circuited() {
        let k: Arc<dyn Kernel> = Arc::new(ExpQuad::new(1, 0.5, 1.0).unwrap());
        let same = apply_to_kernel(&Identity, Arc::clone(&k), 0).unwrap();
        assert!(Arc::ptr_eq(&k, &same));
    }

    #[test]
    fn invalid_argnum() {
        let k: Arc<dyn Kernel> = Arc::new(ExpQuad::new(1, 0.5, 1.0).unwrap());
        assert_eq!(
            apply_to_kernel(&Laplacian, k, 2).unwrap_err(),
            Error::InvalidArgnum(2)
        );
    }
}
