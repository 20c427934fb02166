use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_drift::config::DetectorConfig;
use kolosal_drift::dataset::Dataset;
use kolosal_drift::detectors::DetectorKind;
use kolosal_drift::drift::detect;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_data(n_rows: usize, n_features: usize, shift: f64, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let columns: Vec<(String, Vec<f64>)> = (0..n_features)
        .map(|i| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0 + shift).collect();
            (format!("feature_{}", i), values)
        })
        .collect();
    Dataset::from_columns(columns).unwrap()
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    group.sample_size(10);

    let config = DetectorConfig::default();
    for n_rows in [500, 2000, 5000].iter() {
        let reference = create_data(*n_rows, 8, 0.0, 1);
        let current = create_data(*n_rows, 8, 0.5, 2);

        group.bench_with_input(BenchmarkId::new("covariate", n_rows), &(reference, current), |b, (r, c)| {
            b.iter(|| detect(black_box(r), black_box(c), None, &config).unwrap())
        });
    }

    group.finish();
}

fn bench_single_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("method");
    group.sample_size(10);

    let reference = create_data(2000, 8, 0.0, 3);
    let current = create_data(2000, 8, 0.5, 4);

    for kind in DetectorKind::ALL.iter().filter(|k| **k != DetectorKind::ClassifierDrift) {
        let mut config = DetectorConfig::default();
        for other in DetectorKind::ALL.iter().filter(|o| *o != kind) {
            config = config.disable(*other);
        }

        group.bench_function(kind.name(), |b| {
            b.iter(|| detect(black_box(&reference), black_box(&current), None, &config).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detect, bench_single_methods);
criterion_main!(benches);
