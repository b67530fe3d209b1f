use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use traffic_core::prelude::*;
use traffic_core::{traffic::RawObservation, util::test_graphs::generate_grid_graph};

criterion_group!(benches, observation_count, graph_size);
criterion_main!(benches);

const SPACING: f64 = 0.001;

/// Observations scattered over a grid of `size * size` nodes
fn random_store(size: usize, n: usize, seed: u64) -> TrafficStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let extent = (size - 1) as f64 * SPACING;
    let levels = ["Low", "Medium", "High"];

    TrafficStore::load((0..n).map(|_| {
        RawObservation::new(
            &rng.gen_range(0.0..=extent).to_string(),
            &rng.gen_range(0.0..=extent).to_string(),
            levels[rng.gen_range(0..levels.len())],
        )
    }))
}

fn observation_count(c: &mut Criterion) {
    let g = generate_grid_graph(100, SPACING);
    let params = CongestionParams::new();

    let mut group = c.benchmark_group("congestion_observation_count");
    for n in [100usize, 1_000, 10_000].iter() {
        let store = random_store(100, *n, 7);
        group.bench_with_input(BenchmarkId::from_parameter(n), &store, |b, store| {
            b.iter_batched(
                || g.clone(),
                |mut g| apply_congestion(&mut g, store, &params),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn graph_size(c: &mut Criterion) {
    let params = CongestionParams::new();

    let mut group = c.benchmark_group("congestion_graph_size");
    for size in [25usize, 100, 200].iter() {
        let mut g = generate_grid_graph(*size, SPACING);
        let store = random_store(*size, 1_000, 11);
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            // Recomputed from base lengths, repeated runs do not compound
            b.iter(|| apply_congestion(&mut g, store, &params))
        });
    }
    group.finish();
}
