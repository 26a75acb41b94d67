use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use toxiflow::drift::DatasetDriftDetector;
use toxiflow::training::{KNNRegressor, Regressor};

fn create_descriptor_data(n_rows: usize, n_features: usize, shift: f64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(42);

    let columns: Vec<Column> = (0..n_features)
        .map(|i| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 5.0 + shift).collect();
            Column::new(format!("descriptor_{}", i).into(), values)
        })
        .collect();

    DataFrame::new(columns).unwrap()
}

fn create_regression_arrays(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x.rows().into_iter().map(|row| row.sum() + rng.gen::<f64>() * 0.1).collect();
    (x, y)
}

fn bench_knn_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");
    group.sample_size(10);

    let (x_train, y_train) = create_regression_arrays(5000, 6);
    let mut model = KNNRegressor::with_k(6);
    model.fit(&x_train, &y_train).unwrap();

    for n_rows in [100, 1000, 5000].iter() {
        let (x_test, _) = create_regression_arrays(*n_rows, 6);

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &x_test, |b, x| {
            b.iter(|| model.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

fn bench_drift_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift");
    let detector = DatasetDriftDetector::default();

    for n_rows in [1000, 10000, 50000].iter() {
        let base = create_descriptor_data(*n_rows, 6, 0.0);
        let current = create_descriptor_data(*n_rows / 4, 6, 0.3);

        group.bench_with_input(
            BenchmarkId::new("build_report", n_rows),
            &(base, current),
            |b, (base, current)| b.iter(|| detector.build_report(black_box(base), black_box(current))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_knn_predict, bench_drift_report);
criterion_main!(benches);
