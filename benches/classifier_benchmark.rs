use std::fs;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imagefront::dataset::{read_data_seeded, shuffle_seeded};
use imagefront::{ClassifierTrainer, PrototypeTrainer, SoftmaxTrainer};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const FEATURE_SIZE: usize = 1024; // Inception's softmax2_pre_activation

fn random_features(rows: usize, rng: &mut StdRng) -> Array2<f32> {
    Array2::from_shape_fn((rows, FEATURE_SIZE), |_| rng.gen_range(-1.0..1.0))
}

fn bench_shuffle(c: &mut Criterion) {
    let mut group = c.benchmark_group("Shuffle");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    for &size in &[100usize, 10_000, 100_000] {
        let items: Vec<usize> = (0..size).collect();
        group.bench_function(format!("items_{}", size), |b| {
            b.iter(|| shuffle_seeded(black_box(items.clone()), 42).count())
        });
    }

    group.finish();
}

fn bench_read_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("Dataset");
    group.sample_size(20);

    // 10 classes x 200 files
    let root = TempDir::new().unwrap();
    for k in 0..10 {
        let dir = root.path().join(format!("class_{}", k));
        fs::create_dir_all(&dir).unwrap();
        for i in 0..200 {
            fs::write(dir.join(format!("{}.jpg", i)), b"").unwrap();
        }
    }

    group.bench_function("read_data_2000_files", |b| {
        b.iter(|| read_data_seeded(black_box(root.path()), 7).unwrap())
    });

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scoring");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let mut rng = StdRng::seed_from_u64(3);
    let input = Array1::from_shape_fn(FEATURE_SIZE, |_| rng.gen_range(-1.0..1.0));

    // Test scaling with number of classes
    for &count in &[2usize, 10, 50] {
        let features = random_features(count * 4, &mut rng);
        let keys: Vec<usize> = (0..count * 4).map(|i| i % count).collect();

        let softmax = SoftmaxTrainer {
            iterations: 20,
            ..SoftmaxTrainer::default()
        }
        .fit(features.view(), &keys, count)
        .unwrap();
        let prototype = PrototypeTrainer.fit(features.view(), &keys, count).unwrap();

        group.bench_function(format!("softmax_classes_{}", count), |b| {
            b.iter(|| softmax.scores(black_box(input.view())).unwrap())
        });
        group.bench_function(format!("prototype_classes_{}", count), |b| {
            b.iter(|| prototype.scores(black_box(input.view())).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_shuffle, bench_read_data, bench_scoring);
criterion_main!(benches);
