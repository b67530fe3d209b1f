use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use traffic_core::prelude::*;
use traffic_core::{traffic::RawObservation, util::test_graphs::generate_grid_graph};

criterion_group!(benches, criterion_benchmark, congested);
criterion_main!(benches);

const SPACING: f64 = 0.001;

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dijkstra_on_grid");
    for size in [10usize, 50, 100].iter() {
        let g = generate_grid_graph(*size, SPACING);
        let last = (size * size - 1) as i64;

        group.bench_with_input(BenchmarkId::from_parameter(size), &g, |b, g| {
            b.iter(|| {
                let mut dijkstra = Dijkstra::new(g);
                let _ = dijkstra.search(black_box(0), black_box(last));
            })
        });
    }
    group.finish();
}

fn congested(c: &mut Criterion) {
    let size = 100;
    let mut g = generate_grid_graph(size, SPACING);
    let mut rng = StdRng::seed_from_u64(42);
    let levels = ["Low", "Medium", "High"];

    let observations: Vec<RawObservation> = (0..1_000)
        .map(|_| {
            let row = rng.gen_range(0..size) as f64 * SPACING;
            let col = rng.gen_range(0..size) as f64 * SPACING + SPACING / 2.0;
            RawObservation::new(
                &row.to_string(),
                &col.to_string(),
                levels[rng.gen_range(0..levels.len())],
            )
        })
        .collect();
    let store = TrafficStore::load(observations);
    apply_congestion(&mut g, &store, &CongestionParams::new());

    let last = (size * size - 1) as i64;
    c.bench_function("dijkstra_on_congested_grid", |b| {
        b.iter(|| {
            let _ = search::shortest_path(&g, black_box(0), black_box(last));
        })
    });
}
