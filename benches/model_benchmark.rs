//! Benchmark fitting each classifier family on separable five-class data
//!
//! Run with: cargo bench --bench model_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand::SeedableRng;

use harvest::models::{Hyperparameter, ModelKind, ModelSettings};
use harvest::pipeline::FeatureMatrix;

/// Five Gaussian-ish blobs in `n_features` dimensions
fn generate_blobs(n_rows: usize, n_features: usize, seed: u64) -> (FeatureMatrix, Vec<usize>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n_rows * n_features);
    let mut labels = Vec::with_capacity(n_rows);

    for i in 0..n_rows {
        let class = i % 5;
        for j in 0..n_features {
            let centre = ((class + j) % 5) as f64 * 4.0;
            data.push(centre + rng.gen::<f64>() * 3.0);
        }
        labels.push(class);
    }

    let matrix = FeatureMatrix::new(data, n_rows, n_features).expect("valid shape");
    (matrix, labels)
}

fn benchmark_model_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_fit");
    group.sample_size(10);

    let settings = ModelSettings {
        seed: 50,
        forest_trees: 50,
    };
    let n_features = 25;

    for n_rows in [1_000, 5_000] {
        let (x, y) = generate_blobs(n_rows, n_features, 42);

        for kind in ModelKind::ALL {
            let trainer = kind.trainer(settings);
            // Middle grid value for every family
            let grid = trainer.grid(n_features);
            let hp: Hyperparameter = grid[grid.len() / 2];

            group.bench_with_input(
                BenchmarkId::new(kind.to_string(), n_rows),
                &(&x, &y),
                |b, (x, y)| {
                    b.iter(|| trainer.fit(black_box(x), black_box(y), 5, hp).unwrap());
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_model_fit);
criterion_main!(benches);
