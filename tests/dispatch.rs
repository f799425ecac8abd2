//! Rule registration, fall-through to automatic differentiation, and the
//! error paths of operator application.

use std::any::Any;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::DMatrix;

use linpde_gp::crosscov::{
    scale, KernelIdentityDirac, ProcessVectorCrossCovariance, ScaledProcessVectorCrossCovariance,
};
use linpde_gp::functions::{AdFunction, Function, LambdaFunction, TransformedFunction, ZeroFunction};
use linpde_gp::kernels::{ExpQuad, Kernel, ProductMatern, TransformedKernel};
use linpde_gp::linfuncops::{
    apply_to_crosscov, apply_to_function, apply_to_kernel, register_any_operator_function_rule,
    register_kernel_rule, DirectionalDerivative, Identity, Laplacian, LinearFunctionOperator,
    ScaledLaplacian,
};
use linpde_gp::{DiffOp, Error, HyperDual, Result};

/// Constant kernel without a differentiable representation.
#[derive(Clone, Debug)]
struct Bias {
    dim: usize,
    value: f64,
}

impl Kernel for Bias {
    fn input_dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "Bias"
    }

    fn eval_point(&self, _x0: &[f64], _x1: Option<&[f64]>) -> Result<f64> {
        Ok(self.value)
    }

    fn eval_hyper(&self, _x0: &[HyperDual], _x1: &[HyperDual]) -> Result<HyperDual> {
        Err(Error::NotImplemented {
            operator: "eval_hyper".to_string(),
            target: "Bias",
        })
    }

    fn is_differentiable(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Differentiable wrapper whose registered rule always declines.
#[derive(Debug)]
struct Shy(ExpQuad);

impl Kernel for Shy {
    fn input_dim(&self) -> usize {
        self.0.input_dim()
    }

    fn name(&self) -> &'static str {
        "Shy"
    }

    fn eval_point(&self, x0: &[f64], x1: Option<&[f64]>) -> Result<f64> {
        self.0.eval_point(x0, x1)
    }

    fn eval_hyper(&self, x0: &[HyperDual], x1: &[HyperDual]) -> Result<HyperDual> {
        self.0.eval_hyper(x0, x1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `sin(x0) sinh(x1)`, harmonic in the plane.
#[derive(Debug)]
struct Harmonic;

impl Function for Harmonic {
    fn input_dim(&self) -> usize {
        2
    }

    fn name(&self) -> &'static str {
        "Harmonic"
    }

    fn eval_point(&self, x: &[f64]) -> Result<f64> {
        Ok(x[0].sin() * x[1].sinh())
    }

    fn eval_hyper(&self, x: &[HyperDual]) -> Result<HyperDual> {
        let sinh = (x[1].exp() - (-&x[1]).exp()) * 0.5;
        Ok(x[0].sin() * sinh)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn points(rows: usize, cols: usize, data: &[f64]) -> DMatrix<f64> {
    DMatrix::from_row_slice(rows, cols, data)
}

#[test]
fn registered_rule_handles_non_differentiable_kernel() {
    let k: Arc<dyn Kernel> = Arc::new(Bias { dim: 1, value: 3.0 });
    let dd = DirectionalDerivative::new(vec![1.0]);
    assert_eq!(
        apply_to_kernel(&dd, Arc::clone(&k), 0).unwrap_err(),
        Error::NotImplemented {
            operator: "DirectionalDerivative".to_string(),
            target: "Bias",
        }
    );

    register_kernel_rule::<Laplacian, Bias>(|_, k, _| {
        Some(Ok(Arc::new(Bias {
            dim: k.dim,
            value: 0.0,
        }) as Arc<dyn Kernel>))
    });
    let lk = apply_to_kernel(&Laplacian, k, 1).unwrap();
    assert_eq!(lk.evaluate(&[0.3], Some(&[0.1][..])).unwrap(), 0.0);
}

#[test]
fn declining_rule_falls_through_to_ad() {
    register_kernel_rule::<Laplacian, Shy>(|_, _, _| None);
    let k: Arc<dyn Kernel> = Arc::new(Shy(ExpQuad::new(1, 1.0, 1.0).unwrap()));
    let lk = apply_to_kernel(&Laplacian, k, 0).unwrap();
    assert!(lk.as_any().is::<TransformedKernel>());
    // k'' (0) = −1 for the unit squared exponential.
    assert_relative_eq!(lk.evaluate(&[0.2], None).unwrap(), -1.0, max_relative = 1e-12);
}

#[test]
fn any_operator_function_rule() {
    register_any_operator_function_rule::<Harmonic>(|op, f| {
        op.as_any()
            .is::<Laplacian>()
            .then(|| Ok(Arc::new(ZeroFunction::new(f.input_dim())) as Arc<dyn Function>))
    });
    let f: Arc<dyn Function> = Arc::new(Harmonic);
    let lf = apply_to_function(&Laplacian, Arc::clone(&f)).unwrap();
    assert!(lf.as_any().is::<ZeroFunction>());

    // Other operators are declined and differentiated.
    let sf = apply_to_function(&ScaledLaplacian::new(2.0), f).unwrap();
    assert!(sf.as_any().is::<TransformedFunction>());
    assert_relative_eq!(sf.evaluate(&[0.4, 0.7]).unwrap(), 0.0, epsilon = 1e-12);
}

#[test]
fn non_differentiable_function_is_not_implemented() {
    let f: Arc<dyn Function> = Arc::new(LambdaFunction::new(1, |x| x[0].abs()));
    assert_eq!(
        apply_to_function(&Laplacian, Arc::clone(&f)).unwrap_err(),
        Error::NotImplemented {
            operator: "Laplacian".to_string(),
            target: "LambdaFunction",
        }
    );
    // Identity never needs a representation.
    let same = apply_to_function(&Identity, Arc::clone(&f)).unwrap();
    assert!(Arc::ptr_eq(&same, &f));
}

#[test]
fn zero_function_stays_zero() {
    let f: Arc<dyn Function> = Arc::new(ZeroFunction::new(3));
    let lf = apply_to_function(&DirectionalDerivative::new(vec![1.0, 0.0, 2.0]), f).unwrap();
    assert!(lf.as_any().is::<ZeroFunction>());
}

#[test]
fn ad_functions_are_differentiated() {
    let f: Arc<dyn Function> = Arc::new(AdFunction::new(
        2,
        |x| x[0] * x[0] * x[1],
        |x| &x[0] * &x[0] * &x[1],
    ));
    let lf = apply_to_function(&Laplacian, f).unwrap();
    assert_relative_eq!(lf.evaluate(&[0.5, 3.0]).unwrap(), 6.0, max_relative = 1e-12);
}

#[test]
fn scaled_crosscov_distributes() {
    let k: Arc<dyn Kernel> = Arc::new(ExpQuad::new(1, 0.7, 1.5).unwrap());
    let inner: Arc<dyn ProcessVectorCrossCovariance> =
        Arc::new(KernelIdentityDirac::new(k, points(3, 1, &[-0.5, 0.0, 0.5])).unwrap());
    let scaled = scale(scale(Arc::clone(&inner), 2.0), 1.5);
    let s = scaled
        .as_any()
        .downcast_ref::<ScaledProcessVectorCrossCovariance>()
        .unwrap();
    assert_eq!(s.scalar(), 3.0);

    let lscaled = apply_to_crosscov(&Laplacian, Arc::clone(&scaled)).unwrap();
    assert!(lscaled.as_any().is::<ScaledProcessVectorCrossCovariance>());
    let linner = apply_to_crosscov(&Laplacian, inner).unwrap();
    let x = points(2, 1, &[0.1, 0.9]);
    assert_relative_eq!(
        lscaled.evaluate(&x).unwrap(),
        linner.evaluate(&x).unwrap() * 3.0,
        max_relative = 1e-12
    );
}

#[test]
fn argument_errors() {
    let k: Arc<dyn Kernel> = Arc::new(ExpQuad::new(2, 1.0, 1.0).unwrap());
    assert_eq!(
        apply_to_kernel(&Laplacian, Arc::clone(&k), 2).unwrap_err(),
        Error::InvalidArgnum(2)
    );

    let wrong = DirectionalDerivative::new(vec![1.0, 0.0, 0.0]);
    assert!(matches!(
        apply_to_kernel(&wrong, Arc::clone(&k), 0),
        Err(Error::ShapeMismatch { .. })
    ));
    let m: Arc<dyn Kernel> = Arc::new(ProductMatern::new(vec![1.0, 1.0], 3).unwrap());
    assert!(matches!(
        apply_to_kernel(&wrong, m, 0),
        Err(Error::ShapeMismatch { .. })
    ));

    let lk = apply_to_kernel(&Laplacian, k, 0).unwrap();
    assert!(matches!(
        lk.matrix(&points(1, 3, &[0.0; 3]), &points(1, 2, &[0.0; 2])),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn plan_is_compiled_once_per_signature() {
    let k: Arc<dyn Kernel> = Arc::new(ExpQuad::new(2, 1.0, 1.0).unwrap());
    let lk = TransformedKernel::new(k, "Laplacian", DiffOp::laplacian(2), 1).unwrap();
    let x = points(3, 2, &[0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);
    lk.matrix(&x, &x).unwrap();
    lk.diagonal(&x).unwrap();
    assert_eq!(lk.cached_signatures(), 1);
}

#[test]
fn operator_names_and_representations() {
    let ops: Vec<Box<dyn LinearFunctionOperator>> = vec![
        Box::new(Identity),
        Box::new(Laplacian),
        Box::new(ScaledLaplacian::default()),
        Box::new(DirectionalDerivative::new(vec![1.0, 1.0])),
    ];
    let names: Vec<_> = ops.iter().map(|op| op.name()).collect();
    assert_eq!(
        names,
        ["Identity", "Laplacian", "ScaledLaplacian", "DirectionalDerivative"]
    );
    for op in &ops {
        assert_eq!(op.diffop(2).unwrap().num_vars(), 2);
    }
}
