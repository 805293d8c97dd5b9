//! SO(4) chart and solver micro-benchmarks
//!
//! ## Usage
//!
//! ```bash
//! cargo bench --bench so4_operations
//! ```
//!
//! Covers the closed-form exponential map in each of its coefficient regimes,
//! the Cayley chart in both directions, the adjoint and one Levenberg-Marquardt
//! solve of a short Frobenius chain.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lieopt::{
    FactorGraph, FrobeniusBetweenFactor, FrobeniusPriorFactor, Key, LevenbergMarquardt, Manifold,
    NoiseModel, Ordering, SO4, Values,
};
use nalgebra::{DVector, Vector6};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_tangents(count: usize, scale: f64) -> Vec<Vector6<f64>> {
    let mut rng = StdRng::seed_from_u64(11);
    (0..count)
        .map(|_| Vector6::from_fn(|_, _| scale * (2.0 * rng.random::<f64>() - 1.0)))
        .collect()
}

fn bench_expmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("so4_expmap");
    let cases = [
        ("generic", random_tangents(64, 1.0)),
        // single rotation plane: b = 0
        (
            "one_plane",
            vec![Vector6::new(0.7, 0.0, 0.0, 0.0, 0.0, 0.0); 64],
        ),
        // isoclinic: a = b
        (
            "isoclinic",
            vec![Vector6::new(0.5, 0.0, 0.0, 0.0, 0.0, 0.5); 64],
        ),
    ];
    for (name, tangents) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), tangents, |b, xs| {
            b.iter(|| {
                for xi in xs {
                    black_box(SO4::expmap(black_box(xi), None).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_cayley(c: &mut Criterion) {
    let tangents = random_tangents(64, 0.5);
    let rotations: Vec<SO4> = tangents
        .iter()
        .map(|v| SO4::retract_at_origin(v, None).unwrap())
        .collect();

    c.bench_function("so4_retract_at_origin", |b| {
        b.iter(|| {
            for v in &tangents {
                black_box(SO4::retract_at_origin(black_box(v), None).unwrap());
            }
        });
    });
    c.bench_function("so4_local_at_origin", |b| {
        b.iter(|| {
            for q in &rotations {
                black_box(SO4::local_at_origin(black_box(q), None).unwrap());
            }
        });
    });
    c.bench_function("so4_adjoint", |b| {
        b.iter(|| {
            for q in &rotations {
                black_box(q.adjoint());
            }
        });
    });
}

fn frobenius_chain(length: usize) -> (FactorGraph, Values, Ordering) {
    let key = |i: usize| Key::symbol('q', i as u64);
    let step = SO4::expmap(&Vector6::new(0.1, -0.05, 0.2, 0.0, 0.1, -0.1), None).unwrap();
    let noise = DVector::from_element(6, 0.05);

    let mut graph = FactorGraph::new();
    let mut initial = Values::new();
    let mut truth = SO4::identity();
    graph.add(FrobeniusPriorFactor::new(
        key(0),
        &truth,
        NoiseModel::isotropic(16, 0.01).unwrap(),
    ));
    for i in 0..length {
        if i > 0 {
            graph.add(FrobeniusBetweenFactor::new(
                key(i - 1),
                key(i),
                step.clone(),
                NoiseModel::isotropic(16, 0.1).unwrap(),
            ));
            truth = truth.compose(&step, None, None);
        }
        initial.insert(key(i), truth.retract(&noise).unwrap()).unwrap();
    }
    let ordering = Ordering::from_keys((0..length).map(key)).unwrap();
    (graph, initial, ordering)
}

fn bench_lm_chain(c: &mut Criterion) {
    let (graph, initial, ordering) = frobenius_chain(20);
    c.bench_function("lm_frobenius_chain_20", |b| {
        b.iter(|| {
            let mut solver = LevenbergMarquardt::new();
            black_box(solver.optimize(&graph, &initial, &ordering).unwrap());
        });
    });
}

criterion_group!(benches, bench_expmap, bench_cayley, bench_lm_chain);
criterion_main!(benches);
