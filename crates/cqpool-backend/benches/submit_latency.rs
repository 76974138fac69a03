use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cqpool_backend::{Pool, PoolConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn bench_submit_under_saturation(c: &mut Criterion) {
    let done = Arc::new(AtomicUsize::new(0));
    let done_cb = Arc::clone(&done);

    let config = PoolConfig::new()
        .name("bench")
        .min_threads(4)
        .max_threads(4)
        .max_concurrency(4);

    let pool = Pool::new(config, move |_| {
        done_cb.fetch_add(1, Ordering::Relaxed);
    })
    .expect("pool construction");

    let mut group = c.benchmark_group("submit");
    group.bench_function("submit", |b| {
        b.iter(|| {
            pool.submit(Box::new([])).expect("submit");
            black_box(());
        })
    });
    group.finish();
}

criterion_group!(benches, bench_submit_under_saturation);
criterion_main!(benches);
