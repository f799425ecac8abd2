use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linpde_gp::kernels::{Kernel, ProductMatern, TransformedKernel};
use linpde_gp::linfuncops::{apply_to_kernel, Laplacian};
use linpde_gp::DiffOp;

fn make_points(n: usize, d: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DMatrix::from_fn(n, d, |_, _| rng.gen_range(-1.0..1.0))
}

/// Δ k Δ' for the product Matérn: closed form against nested AD.
fn bench_laplacian_laplacian(c: &mut Criterion) {
    let mut group = c.benchmark_group("matern_laplacian_laplacian");
    for d in [1, 2, 3] {
        let k: Arc<dyn Kernel> = Arc::new(ProductMatern::isotropic(d, 0.7, 3).unwrap());
        let x = make_points(32, d, d as u64);

        let closed = apply_to_kernel(
            &Laplacian,
            apply_to_kernel(&Laplacian, Arc::clone(&k), 1).unwrap(),
            0,
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("closed_form", d), &x, |b, x| {
            b.iter(|| black_box(closed.matrix(black_box(x), black_box(x)).unwrap()))
        });

        let inner: Arc<dyn Kernel> =
            Arc::new(TransformedKernel::new(Arc::clone(&k), "Laplacian", DiffOp::laplacian(d), 1).unwrap());
        let ad = TransformedKernel::new(inner, "Laplacian", DiffOp::laplacian(d), 0).unwrap();
        group.bench_with_input(BenchmarkId::new("ad", d), &x, |b, x| {
            b.iter(|| black_box(ad.matrix(black_box(x), black_box(x)).unwrap()))
        });
    }
    group.finish();
}

fn bench_gram(c: &mut Criterion) {
    let mut group = c.benchmark_group("matern_gram");
    for n in [16, 64, 256] {
        let k = ProductMatern::isotropic(2, 0.5, 3).unwrap();
        let x = make_points(n, 2, 7);
        group.bench_with_input(BenchmarkId::from_parameter(n), &x, |b, x| {
            b.iter(|| black_box(k.matrix(black_box(x), black_box(x)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_laplacian_laplacian, bench_gram);
criterion_main!(benches);
