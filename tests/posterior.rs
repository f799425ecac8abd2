//! Incremental conditioning against joint conditioning and against dense
//! reference formulas.

use std::f64::consts::PI;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Cholesky, DMatrix, DVector};

use linpde_gp::functions::{AdFunction, Function};
use linpde_gp::kernels::{ExpQuad, Kernel, ProductMatern};
use linpde_gp::linfuncops::{
    apply_to_kernel, apply_to_posterior, apply_to_process, Laplacian, LinearFunctionOperator,
    ScaledLaplacian,
};
use linpde_gp::nalgebra_support::{block_diag, column_points, concat_vectors, linspace, split_rows, split_vector};
use linpde_gp::randprocs::{GaussianProcess, Normal, PosteriorGaussianProcess, RandomProcess};

const BATCH_SIZES: [usize; 4] = [2, 3, 2, 4];

struct Fixture {
    prior: GaussianProcess,
    xs: DMatrix<f64>,
    ys: DVector<f64>,
    noise: Vec<Option<Normal>>,
    x_test: DMatrix<f64>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture() -> Fixture {
    init_tracing();
    let prior = GaussianProcess::centered(Arc::new(ExpQuad::new(1, 0.25, 2.0).unwrap()));
    let grid = linspace(-1.0, 1.0, 11);
    let ys = DVector::from_iterator(grid.len(), grid.iter().map(|x| 2.0 * (PI * x).sin()));
    let noise = vec![
        Some(Normal::isotropic(DVector::from_element(2, 1.0), 0.36)),
        None,
        None,
        Some(Normal::isotropic(DVector::zeros(4), 0.09)),
    ];
    Fixture {
        prior,
        xs: column_points(&grid),
        ys,
        noise,
        x_test: column_points(&linspace(-1.0, 1.0, 50)),
    }
}

fn sequential(f: &Fixture) -> PosteriorGaussianProcess {
    let xs = split_rows(&f.xs, &BATCH_SIZES);
    let ys = split_vector(&f.ys, &BATCH_SIZES);
    let mut post = PosteriorGaussianProcess::from_prior(f.prior.clone());
    for ((x, y), noise) in xs.into_iter().zip(ys).zip(&f.noise) {
        post = post.condition_on_observations(x, y, noise.clone(), None).unwrap();
    }
    post
}

/// Noise of all batches as one normal; `None` contributes zeros.
fn joint_noise(f: &Fixture) -> Normal {
    let (means, covs): (Vec<_>, Vec<_>) = BATCH_SIZES
        .iter()
        .zip(&f.noise)
        .map(|(&n, noise)| match noise {
            Some(noise) => (noise.mean().clone(), noise.cov().clone()),
            None => (DVector::zeros(n), DMatrix::zeros(n, n)),
        })
        .unzip();
    Normal::new(concat_vectors(&means), block_diag(&covs)).unwrap()
}

fn joint(f: &Fixture) -> PosteriorGaussianProcess {
    f.prior
        .condition_on_observations(f.xs.clone(), f.ys.clone(), Some(joint_noise(f)), None)
        .unwrap()
}

#[test]
fn sequential_matches_joint_conditioning() {
    let f = fixture();
    let seq = sequential(&f);
    let joint = joint(&f);
    assert_eq!(seq.batches().len(), 4);
    assert_eq!(seq.num_observations(), 11);

    assert_relative_eq!(
        seq.mean(&f.x_test).unwrap(),
        joint.mean(&f.x_test).unwrap(),
        max_relative = 1e-7,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        seq.var(&f.x_test).unwrap(),
        joint.var(&f.x_test).unwrap(),
        max_relative = 1e-7,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        seq.cov(&f.x_test, &f.x_test).unwrap(),
        joint.cov(&f.x_test, &f.x_test).unwrap(),
        max_relative = 1e-7,
        epsilon = 1e-9
    );
}

#[test]
fn joint_factor_matches_dense_cholesky() {
    let f = fixture();
    let seq = sequential(&f);
    let gram = f.prior.cov_kernel().matrix(&f.xs, &f.xs).unwrap() + joint_noise(&f).cov();
    let dense = Cholesky::new(gram).unwrap().l();
    assert_relative_eq!(*seq.factor(), dense, max_relative = 1e-9, epsilon = 1e-12);
}

#[test]
fn operator_commutes_with_conditioning() {
    let f = fixture();
    let op = ScaledLaplacian::new(0.5);
    let post = apply_to_posterior(&op, &sequential(&f)).unwrap();

    // Dense reference: L m* = (L k)(x, X) G⁻¹ (y − μ), L k* L' = L k L' − (L k) G⁻¹ (k L').
    let k = Arc::clone(f.prior.cov_kernel());
    let noise = joint_noise(&f);
    let gram = k.matrix(&f.xs, &f.xs).unwrap() + noise.cov();
    let chol = Cholesky::new(gram).unwrap();
    let lk = apply_to_kernel(&op, Arc::clone(&k), 0).unwrap();
    let lkl = apply_to_kernel(&op, apply_to_kernel(&op, Arc::clone(&k), 1).unwrap(), 0).unwrap();
    let cross = lk.matrix(&f.x_test, &f.xs).unwrap();
    let mean = &cross * chol.solve(&(&f.ys - noise.mean()));
    let cov = lkl.matrix(&f.x_test, &f.x_test).unwrap() - &cross * chol.solve(&cross.transpose());

    assert_relative_eq!(post.mean(&f.x_test).unwrap(), mean, max_relative = 1e-7, epsilon = 1e-6);
    assert_relative_eq!(
        post.cov(&f.x_test, &f.x_test).unwrap(),
        cov,
        max_relative = 1e-7,
        epsilon = 1e-6
    );
    assert_relative_eq!(
        post.var(&f.x_test).unwrap(),
        cov.diagonal(),
        max_relative = 1e-7,
        epsilon = 1e-6
    );
}

#[test]
fn transformed_posterior_matches_ad_of_posterior_moments() {
    let f = fixture();
    let op = ScaledLaplacian::new(0.5);
    let seq = sequential(&f);
    let closed = seq.apply_operator(&op).unwrap();
    let generic = apply_to_process(&op, &seq.as_gaussian_process().unwrap()).unwrap();

    let x = column_points(&linspace(-0.9, 0.9, 7));
    assert_relative_eq!(
        closed.mean(&x).unwrap(),
        generic.mean(&x).unwrap(),
        max_relative = 1e-7,
        epsilon = 1e-6
    );
    assert_relative_eq!(
        closed.cov(&x, &x).unwrap(),
        generic.cov(&x, &x).unwrap(),
        max_relative = 1e-7,
        epsilon = 1e-6
    );
}

#[test]
fn transformed_posterior_shares_factor() {
    let f = fixture();
    let seq = sequential(&f);
    let op: Arc<dyn LinearFunctionOperator> = Arc::new(ScaledLaplacian::default());
    let post = seq.apply_operator(op.as_ref()).unwrap();
    assert_eq!(post.factor(), seq.factor());
    assert_eq!(post.representer_weights(), seq.representer_weights());
    assert_eq!(post.num_observations(), seq.num_observations());
}

#[test]
fn operator_observations_match_dense_reference() {
    // Condition on Δf at a few points and on f at the boundary.
    let prior = GaussianProcess::centered(Arc::new(ExpQuad::new(1, 0.5, 1.0).unwrap()));
    let op: Arc<dyn LinearFunctionOperator> = Arc::new(ScaledLaplacian::default());
    let x_pde = column_points(&[-0.5, 0.0, 0.5]);
    let y_pde = DVector::from_vec(vec![-PI * PI, 0.0, PI * PI]).map(|v| v * 0.1);
    let x_bc = column_points(&[-1.0, 1.0]);
    let y_bc = DVector::zeros(2);

    let post = prior
        .condition_on_observations(x_pde.clone(), y_pde.clone(), None, Some(Arc::clone(&op)))
        .unwrap()
        .condition_on_observations(x_bc.clone(), y_bc.clone(), None, None)
        .unwrap();

    let k = Arc::clone(prior.cov_kernel());
    let lk = apply_to_kernel(op.as_ref(), Arc::clone(&k), 1).unwrap();
    let lkl = apply_to_kernel(op.as_ref(), Arc::clone(&lk), 0).unwrap();
    let mut gram = DMatrix::zeros(5, 5);
    gram.view_mut((0, 0), (3, 3)).copy_from(&lkl.matrix(&x_pde, &x_pde).unwrap());
    let lk_bc = lk.matrix(&x_bc, &x_pde).unwrap();
    gram.view_mut((3, 0), (2, 3)).copy_from(&lk_bc);
    gram.view_mut((0, 3), (3, 2)).copy_from(&lk_bc.transpose());
    gram.view_mut((3, 3), (2, 2)).copy_from(&k.matrix(&x_bc, &x_bc).unwrap());
    let alpha = Cholesky::new(gram).unwrap().solve(&concat_vectors(&[y_pde, y_bc]));

    let x = column_points(&linspace(-1.0, 1.0, 9));
    let mut cross = DMatrix::zeros(9, 5);
    cross.view_mut((0, 0), (9, 3)).copy_from(&lk.matrix(&x, &x_pde).unwrap());
    cross.view_mut((0, 3), (9, 2)).copy_from(&k.matrix(&x, &x_bc).unwrap());
    assert_relative_eq!(post.mean(&x).unwrap(), cross * alpha, max_relative = 1e-7, epsilon = 1e-9);
}

#[test]
fn conditioning_is_pure() {
    let f = fixture();
    let first = PosteriorGaussianProcess::from_prior(f.prior.clone())
        .condition_on_observations(
            f.xs.rows(0, 2).into_owned(),
            f.ys.rows(0, 2).into_owned(),
            f.noise[0].clone(),
            None,
        )
        .unwrap();
    let before = first.mean(&f.x_test).unwrap();
    let _second = first
        .condition_on_observations(
            f.xs.rows(2, 3).into_owned(),
            f.ys.rows(2, 3).into_owned(),
            None,
            None,
        )
        .unwrap();
    assert_eq!(first.batches().len(), 1);
    assert_eq!(first.mean(&f.x_test).unwrap(), before);
}

#[test]
fn mean_and_noise_offsets_with_operator_observations() {
    init_tracing();
    // m(x) = 2 sin x, so Δm = −2 sin x.
    let mean: Arc<dyn Function> = Arc::new(AdFunction::new(
        1,
        |x| 2.0 * x[0].sin(),
        |x| x[0].sin() * 2.0,
    ));
    let k: Arc<dyn Kernel> = Arc::new(ProductMatern::new(vec![0.6], 3).unwrap());
    let prior = GaussianProcess::new(Arc::clone(&mean), Arc::clone(&k)).unwrap();
    let op: Arc<dyn LinearFunctionOperator> = Arc::new(Laplacian);

    let x_f = column_points(&[-1.0, 0.0, 1.0]);
    let y_f = DVector::from_vec(vec![-1.5, 0.2, 1.8]);
    let noise_f = Normal::isotropic(DVector::from_element(3, 0.1), 0.01);
    let x_l = column_points(&[-0.5, 0.5]);
    let y_l = DVector::from_vec(vec![0.9, -1.1]);
    let noise_l = Normal::isotropic(DVector::from_element(2, -0.2), 0.04);

    let post = prior
        .condition_on_observations(x_f.clone(), y_f.clone(), Some(noise_f.clone()), None)
        .unwrap()
        .condition_on_observations(
            x_l.clone(),
            y_l.clone(),
            Some(noise_l.clone()),
            Some(Arc::clone(&op)),
        )
        .unwrap();
    let lpost = apply_to_posterior(op.as_ref(), &post).unwrap();

    // Dense joint reference over [f(X_f); Δf(X_l)].
    let kl = apply_to_kernel(op.as_ref(), Arc::clone(&k), 1).unwrap();
    let lk = apply_to_kernel(op.as_ref(), Arc::clone(&k), 0).unwrap();
    let lkl = apply_to_kernel(op.as_ref(), Arc::clone(&kl), 0).unwrap();
    let mut gram = DMatrix::zeros(5, 5);
    gram.view_mut((0, 0), (3, 3))
        .copy_from(&(k.matrix(&x_f, &x_f).unwrap() + noise_f.cov()));
    let upper = kl.matrix(&x_f, &x_l).unwrap();
    gram.view_mut((0, 3), (3, 2)).copy_from(&upper);
    gram.view_mut((3, 0), (2, 3)).copy_from(&upper.transpose());
    gram.view_mut((3, 3), (2, 2))
        .copy_from(&(lkl.matrix(&x_l, &x_l).unwrap() + noise_l.cov()));
    let chol = Cholesky::new(gram).unwrap();
    let m_f = mean.evaluate_batch(&x_f).unwrap();
    let lm_l = x_l.column(0).map(|v| -2.0 * v.sin());
    let residual = concat_vectors(&[
        &y_f - m_f - noise_f.mean(),
        &y_l - lm_l - noise_l.mean(),
    ]);
    let alpha = chol.solve(&residual);

    let x = column_points(&linspace(-1.2, 1.2, 9));
    let mut cross = DMatrix::zeros(9, 5);
    cross.view_mut((0, 0), (9, 3)).copy_from(&k.matrix(&x, &x_f).unwrap());
    cross.view_mut((0, 3), (9, 2)).copy_from(&kl.matrix(&x, &x_l).unwrap());
    let expected_mean = mean.evaluate_batch(&x).unwrap() + &cross * &alpha;
    let expected_cov =
        k.matrix(&x, &x).unwrap() - &cross * chol.solve(&cross.transpose());
    assert_relative_eq!(post.mean(&x).unwrap(), expected_mean, max_relative = 1e-7, epsilon = 1e-8);
    assert_relative_eq!(
        post.cov(&x, &x).unwrap(),
        expected_cov,
        max_relative = 1e-7,
        epsilon = 1e-8
    );

    let mut lcross = DMatrix::zeros(9, 5);
    lcross.view_mut((0, 0), (9, 3)).copy_from(&lk.matrix(&x, &x_f).unwrap());
    lcross.view_mut((0, 3), (9, 2)).copy_from(&lkl.matrix(&x, &x_l).unwrap());
    let expected_lmean = x.column(0).map(|v| -2.0 * v.sin()) + &lcross * &alpha;
    let expected_lcov =
        lkl.matrix(&x, &x).unwrap() - &lcross * chol.solve(&lcross.transpose());
    assert_relative_eq!(
        lpost.mean(&x).unwrap(),
        expected_lmean,
        max_relative = 1e-7,
        epsilon = 1e-6
    );
    assert_relative_eq!(
        lpost.cov(&x, &x).unwrap(),
        expected_lcov,
        max_relative = 1e-7,
        epsilon = 1e-6
    );
}
