//! Benchmarks for the Hungarian assignment solver.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use matchmaker_core::assignment::{solve, AssignmentProblem};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_costs(n: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..n).map(|_| rng.gen_range(1.0..1000.0)).collect())
        .collect()
}

fn bench_hungarian_square(c: &mut Criterion) {
    let mut group = c.benchmark_group("hungarian_square");

    for size in [10, 50, 100, 200].iter() {
        let costs = random_costs(*size, 42);
        let problem = AssignmentProblem::from_costs(costs);

        group.bench_with_input(BenchmarkId::from_parameter(size), &problem, |b, p| {
            b.iter(|| solve(black_box(p)));
        });
    }

    group.finish();
}

fn bench_hungarian_rectangular(c: &mut Criterion) {
    let mut group = c.benchmark_group("hungarian_rectangular");

    for &(agents, tasks) in &[(20usize, 80usize), (100, 400)] {
        let mut rng = StdRng::seed_from_u64(7);
        let costs: Vec<Vec<f64>> = (0..agents)
            .map(|_| (0..tasks).map(|_| rng.gen_range(1.0..1000.0)).collect())
            .collect();
        let problem = AssignmentProblem::from_costs(costs);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{agents}x{tasks}")),
            &problem,
            |b, p| b.iter(|| solve(black_box(p))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_hungarian_square, bench_hungarian_rectangular);
criterion_main!(benches);
