use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array1, Array2};
use teachable::classifier::{fit_epoch, SoftmaxHead};

const INPUT_DIM: usize = 256;
const HIDDEN: usize = 128;
const CLASSES: usize = 4;

fn synthetic_dataset(n: usize) -> (Array2<f32>, Array2<f32>) {
    let inputs = Array2::from_shape_fn((n, INPUT_DIM), |(r, c)| {
        let class = r % CLASSES;
        let center = class as f32 - 1.5;
        center + ((r * 31 + c * 7) % 100) as f32 / 500.0
    });
    let mut targets = Array2::<f32>::zeros((n, CLASSES));
    for r in 0..n {
        targets[[r, r % CLASSES]] = 1.0;
    }
    (inputs, targets)
}

fn bench_forward(c: &mut Criterion) {
    let head = SoftmaxHead::new_seeded(INPUT_DIM, HIDDEN, CLASSES, 7);
    let single = Array1::from_shape_fn(INPUT_DIM, |i| (i % 13) as f32 / 13.0);
    let (batch, _) = synthetic_dataset(64);

    let mut group = c.benchmark_group("Forward");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    group.bench_function("single_vector", |b| {
        b.iter(|| head.forward(black_box(&single)))
    });

    group.bench_function("batch_64", |b| {
        b.iter(|| head.forward_batch(black_box(&batch)))
    });

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(30);
    group.warm_up_time(std::time::Duration::from_secs(1));

    for &n in &[32usize, 128] {
        let (inputs, targets) = synthetic_dataset(n);
        group.bench_function(format!("fit_epoch_{}_examples", n), |b| {
            b.iter(|| {
                let mut head = SoftmaxHead::new_seeded(INPUT_DIM, HIDDEN, CLASSES, 7);
                fit_epoch(
                    &mut head,
                    black_box(&inputs),
                    black_box(&targets),
                    16,
                    0.1,
                    42,
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forward, bench_training);
criterion_main!(benches);
