use std::f64::consts::PI;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linpde_gp::functions::{AdFunction, Function};
use linpde_gp::kernels::{ExpQuad, Kernel, ProductMatern};
use linpde_gp::linfuncops::{
    apply_to_function, apply_to_kernel, join_time_space, split_time_space, HeatOperator,
    LinearFunctionOperator,
};
use linpde_gp::HyperDual;

fn random_space_time(rng: &mut StdRng, n: usize, d: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, d, |_, j| {
        if j == 0 {
            rng.gen_range(0.0..1.0)
        } else {
            rng.gen_range(-1.0..1.0)
        }
    })
}

#[test]
fn annihilates_1d_heat_solution() {
    // u(t, x) = exp(−π² t) sin(π x)
    let u: Arc<dyn Function> = Arc::new(AdFunction::new(
        2,
        |x| (-PI * PI * x[0]).exp() * (PI * x[1]).sin(),
        |x| (&x[0] * (-PI * PI)).exp() * (&x[1] * PI).sin(),
    ));
    let hu = apply_to_function(&HeatOperator::default(), Arc::clone(&u)).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let x = random_space_time(&mut rng, 20, 2);
    for v in hu.evaluate_batch(&x).unwrap().iter() {
        assert_relative_eq!(*v, 0.0, epsilon = 1e-10);
    }
}

#[test]
fn annihilates_2d_heat_solution() {
    // u(t, x, y) = exp(−2π² α t) sin(π x) sin(π y)
    let alpha = 0.3;
    let u: Arc<dyn Function> = Arc::new(AdFunction::from_hyper(3, move |x: &[HyperDual]| {
        (&x[0] * (-2.0 * PI * PI * alpha)).exp() * (&x[1] * PI).sin() * (&x[2] * PI).sin()
    }));
    let hu = apply_to_function(&HeatOperator::new(alpha), u).unwrap();
    let mut rng = StdRng::seed_from_u64(12);
    let x = random_space_time(&mut rng, 20, 3);
    for v in hu.evaluate_batch(&x).unwrap().iter() {
        assert_relative_eq!(*v, 0.0, epsilon = 1e-10);
    }
}

#[test]
fn detects_non_solutions() {
    // u = t + x²: u_t − u_xx = 1 − 2
    let u: Arc<dyn Function> = Arc::new(AdFunction::from_hyper(2, |x: &[HyperDual]| {
        &x[0] + &x[1] * &x[1]
    }));
    let hu = apply_to_function(&HeatOperator::default(), u).unwrap();
    assert_relative_eq!(hu.evaluate(&[0.2, 0.4]).unwrap(), -1.0, max_relative = 1e-12);
}

#[test]
fn heat_kernels_fall_back_to_ad() {
    let op = HeatOperator::default();
    for k in [
        Arc::new(ExpQuad::new(2, 0.7, 1.0).unwrap()) as Arc<dyn Kernel>,
        Arc::new(ProductMatern::new(vec![0.5, 0.8], 3).unwrap()),
    ] {
        let hk = apply_to_kernel(&op, apply_to_kernel(&op, k, 1).unwrap(), 0).unwrap();
        let x = DMatrix::from_row_slice(2, 2, &[0.1, 0.2, 0.4, -0.3]);
        let gram = hk.matrix(&x, &x).unwrap();
        assert_relative_eq!(gram[(0, 1)], gram[(1, 0)], max_relative = 1e-10);
        assert!(gram[(0, 0)] > 0.0);
    }
}

#[test]
fn needs_space_coordinates() {
    assert!(HeatOperator::default().diffop(1).is_err());
    assert!(split_time_space(&[1.0]).is_err());
    let p = join_time_space(0.5, &[1.0, 2.0]);
    let (t, x) = split_time_space(&p).unwrap();
    assert_eq!(t, 0.5);
    assert_eq!(x, &[1.0, 2.0]);
}
