use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retrying::{stop, wait, Attempt, AttemptError, InstantBlock, Retryer, WaitStrategy};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct BenchError;

fn failed(n: u64) -> Attempt<(), BenchError> {
    Attempt::failed(AttemptError::Operation(BenchError), n, Duration::from_millis(n * 10))
}

fn wait_strategy_compute(c: &mut Criterion) {
    let attempts: Vec<_> = (1..=64).map(failed).collect();
    let exponential = wait::exponential_with(10, Duration::from_secs(60)).unwrap();
    let fibonacci = wait::fibonacci_with(10, Duration::from_secs(60)).unwrap();
    let composite = wait::join::<(), BenchError>(vec![
        Arc::new(wait::fixed(Duration::from_millis(100))),
        Arc::new(wait::random_up_to(Duration::from_millis(50)).unwrap()),
        Arc::new(fibonacci),
    ])
    .unwrap();

    c.bench_function("exponential_wait_64_attempts", |b| {
        b.iter(|| {
            for attempt in &attempts {
                black_box(exponential.compute_wait(black_box(attempt)));
            }
        });
    });

    c.bench_function("fibonacci_wait_64_attempts", |b| {
        b.iter(|| {
            for attempt in &attempts {
                black_box(fibonacci.compute_wait(black_box(attempt)));
            }
        });
    });

    c.bench_function("composite_wait_64_attempts", |b| {
        b.iter(|| {
            for attempt in &attempts {
                black_box(composite.compute_wait(black_box(attempt)));
            }
        });
    });
}

fn retry_loop_overhead(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let retryer = Retryer::<u32, BenchError>::builder()
        .retry_if_failure()
        .with_stop_strategy(stop::after_attempt(5).unwrap())
        .with_block_strategy(InstantBlock)
        .build()
        .unwrap();

    c.bench_function("retryer_first_attempt_success", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(retryer.call(|| async { Ok::<_, BenchError>(1) }).await);
        });
    });

    c.bench_function("retryer_five_failed_attempts", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(retryer.call(|| async { Err::<u32, _>(BenchError) }).await);
        });
    });
}

criterion_group!(benches, wait_strategy_compute, retry_loop_overhead);
criterion_main!(benches);
