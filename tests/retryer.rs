use retrying::{
    stop, time_limit, wait, Attempt, AttemptError, CancellationToken, InstantBlock,
    MemoryListener, RetryError, Retryer, TimeoutError, TrackingBlock,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("TestError: {0}")]
struct TestError(String);

#[derive(Debug, thiserror::Error)]
#[error("io wrapper")]
struct IoWrapper(#[source] std::io::Error);

#[tokio::test]
async fn stop_after_attempt_permits_exactly_n_attempts() {
    for n in 1..=5u64 {
        let retryer = Retryer::<(), TestError>::builder()
            .retry_if_failure()
            .with_stop_strategy(stop::after_attempt(n).unwrap())
            .with_block_strategy(InstantBlock)
            .build()
            .expect("builder");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = retryer
            .call(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError("always".into())) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst) as u64, n);
        assert_eq!(err.termination().unwrap().number_of_failed_attempts(), n);
    }
}

#[tokio::test(start_paused = true)]
async fn stop_after_delay_terminates_on_first_late_attempt() {
    let retryer = Retryer::<(), TestError>::builder()
        .retry_if_failure()
        .with_stop_strategy(stop::after_delay(Duration::from_millis(250)))
        .with_wait_strategy(wait::fixed(Duration::from_millis(100)))
        .build()
        .expect("builder");

    let err = retryer
        .call(|| async { Err(TestError("slow".into())) })
        .await
        .unwrap_err();

    let last = err.termination().unwrap().last_failed_attempt();
    // attempts start at 0, 100, 200, 300ms; only the fourth is past 250ms
    assert_eq!(last.attempt_number(), 4);
    assert!(last.delay_since_first_attempt() >= Duration::from_millis(250));
    assert!(last.delay_since_first_attempt() < Duration::from_millis(350));
}

#[tokio::test]
async fn rejecting_first_k_failures_succeeds_on_attempt_k_plus_one() {
    const K: usize = 3;
    let listener = MemoryListener::new();
    let retryer = Retryer::<usize, TestError>::builder()
        .retry_if_failure()
        .with_block_strategy(InstantBlock)
        .with_retry_listener(listener.clone())
        .build()
        .expect("builder");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let value = retryer
        .call(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < K {
                    Err(TestError(format!("failure {n}")))
                } else {
                    Ok(n + 1)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, K + 1);
    let records = listener.records();
    assert_eq!(records.last().unwrap().attempt_number, (K + 1) as u64);
    assert_eq!(records.iter().filter(|r| !r.succeeded).count(), K);
}

#[tokio::test]
async fn listeners_run_once_per_attempt_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = {
        let log = log.clone();
        move |a: &Attempt<u32, TestError>| log.lock().unwrap().push(("first", a.attempt_number()))
    };
    let second = {
        let log = log.clone();
        move |a: &Attempt<u32, TestError>| log.lock().unwrap().push(("second", a.attempt_number()))
    };
    let retryer = Retryer::<u32, TestError>::builder()
        .retry_if_failure()
        .with_stop_strategy(stop::after_attempt(2).unwrap())
        .with_block_strategy(InstantBlock)
        .with_retry_listener(first)
        .with_retry_listener(second)
        .build()
        .expect("builder");

    let _ = retryer.call(|| async { Err(TestError("x".into())) }).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_sleep_keeps_attempt_count() {
    let retryer = Retryer::<(), TestError>::builder()
        .retry_if_failure()
        .with_wait_strategy(wait::fixed(Duration::from_secs(60)))
        .build()
        .expect("builder");
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(90)).await;
        canceller.cancel();
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let err = retryer
        .call_with_cancel(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError("down".into())) }
            },
            &token,
        )
        .await
        .unwrap_err();

    // attempts at 0s and 60s; cancelled during the second wait
    assert!(err.is_interrupted());
    let termination = err.termination().unwrap();
    assert_eq!(termination.number_of_failed_attempts(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(termination.last_failed_attempt().failure().unwrap().is_operation());
}

#[tokio::test]
async fn cancelled_token_never_invokes_the_operation() {
    let listener = MemoryListener::new();
    let retryer = Retryer::<(), TestError>::builder()
        .retry_if_failure()
        .with_retry_listener(listener.clone())
        .build()
        .expect("builder");
    let token = CancellationToken::new();
    token.cancel();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let err = retryer
        .call_with_cancel(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
            &token,
        )
        .await
        .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(err.termination().unwrap().number_of_failed_attempts(), 1);
    assert!(err.last_cause().unwrap().is_interrupted());
    assert_eq!(listener.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_attempt_records_interrupted_attempt() {
    let listener = MemoryListener::new();
    let retryer = Retryer::<(), TestError>::builder()
        .retry_if_failure()
        .with_retry_listener(listener.clone())
        .build()
        .expect("builder");
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = retryer
        .call_with_cancel(
            || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            },
            &token,
        )
        .await
        .unwrap_err();

    assert!(err.is_interrupted());
    assert!(err.last_cause().unwrap().is_interrupted());
    assert_eq!(listener.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_attempts_are_retried() {
    let retryer = Retryer::<u32, TestError>::builder()
        .retry_if_timeout()
        .with_attempt_time_limiter(
            time_limit::fixed(Duration::from_millis(50), tokio::runtime::Handle::current())
                .unwrap(),
        )
        .with_stop_strategy(stop::after_attempt(5).unwrap())
        .with_block_strategy(InstantBlock)
        .build()
        .expect("builder");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let value = retryer
        .call(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok(n as u32)
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_termination_chains_to_timeout_cause() {
    let retryer = Retryer::<u32, TestError>::builder()
        .retry_if_timeout()
        .with_attempt_time_limiter(
            time_limit::fixed(Duration::from_millis(20), tokio::runtime::Handle::current())
                .unwrap(),
        )
        .with_stop_strategy(stop::after_attempt(2).unwrap())
        .with_block_strategy(InstantBlock)
        .build()
        .expect("builder");

    let err = retryer
        .call(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(1)
        })
        .await
        .unwrap_err();

    let cause = err.last_cause().unwrap();
    assert!(cause.find::<TimeoutError>().is_some());
    let source = std::error::Error::source(&err).expect("source");
    assert!(source.to_string().contains("timed out"), "{source}");
}

#[tokio::test]
async fn error_type_condition_walks_source_chain() {
    let retryer = Retryer::<u32, IoWrapper>::builder()
        .retry_if_error_of::<std::io::Error>()
        .with_stop_strategy(stop::after_attempt(3).unwrap())
        .with_block_strategy(InstantBlock)
        .build()
        .expect("builder");

    let err = retryer
        .call(|| async {
            Err(IoWrapper(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")))
        })
        .await
        .unwrap_err();

    assert_eq!(err.termination().unwrap().number_of_failed_attempts(), 3);
}

#[tokio::test]
async fn error_driven_wait_uses_matching_failure() {
    let block = TrackingBlock::new();
    let retryer = Retryer::<u32, IoWrapper>::builder()
        .retry_if_failure()
        .with_wait_strategy(wait::error_wait(|e: &std::io::Error| match e.kind() {
            std::io::ErrorKind::TimedOut => Duration::from_millis(500),
            _ => Duration::from_millis(5),
        }))
        .with_stop_strategy(stop::after_attempt(3).unwrap())
        .with_block_strategy(block.clone())
        .build()
        .expect("builder");

    let _ = retryer
        .call(|| async {
            Err(IoWrapper(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow")))
        })
        .await;

    assert_eq!(block.calls(), vec![Duration::from_millis(500); 2]);
}

#[tokio::test]
async fn accepted_failure_propagates_original_cause() {
    let retryer = Retryer::<u32, TestError>::builder()
        .retry_if_result(|v| *v == 0)
        .build()
        .expect("builder");

    let err = retryer.call(|| async { Err(TestError("fatal".into())) }).await.unwrap_err();

    assert!(!err.is_terminated());
    assert_eq!(err.into_operation(), Some(TestError("fatal".into())));
}

struct Client {
    requests: AtomicUsize,
}

impl Client {
    async fn fetch(&self) -> Result<usize, TestError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        if n < 3 {
            Err(TestError(format!("request {n} refused")))
        } else {
            Ok(n)
        }
    }
}

#[tokio::test]
async fn operations_may_borrow_caller_state() {
    let client = Client { requests: AtomicUsize::new(0) };
    let retryer = Retryer::<usize, TestError>::builder()
        .retry_if_failure()
        .with_block_strategy(InstantBlock)
        .build()
        .expect("builder");

    assert_eq!(retryer.call(|| client.fetch()).await.unwrap(), 3);

    let mut wrapped = retryer.wrap(|| client.fetch());
    assert_eq!(wrapped.call().await.unwrap(), 4);
    assert_eq!(client.requests.load(Ordering::SeqCst), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retryer_is_reusable_across_concurrent_executions() {
    let retryer = Retryer::<u64, TestError>::builder()
        .retry_if_failure()
        .with_stop_strategy(stop::after_attempt(10).unwrap())
        .with_wait_strategy(wait::fixed(Duration::from_millis(1)))
        .build()
        .expect("builder");

    let mut handles = Vec::new();
    for failures in 0..8usize {
        let retryer = retryer.clone();
        handles.push(tokio::spawn(async move {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            let result = retryer
                .call(move || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < failures {
                            Err(TestError("again".into()))
                        } else {
                            Ok(n as u64 + 1)
                        }
                    }
                })
                .await;
            (failures, result)
        }));
    }

    for handle in handles {
        let (failures, result) = handle.await.unwrap();
        assert_eq!(result.unwrap(), failures as u64 + 1, "each execution counts from 1");
    }
}

#[tokio::test]
async fn unknown_panic_payload_is_still_captured() {
    let retryer = Retryer::<u32, TestError>::builder().build().expect("builder");

    let err = retryer
        .call(|| async {
            if true {
                std::panic::panic_any(17u8);
            }
            Ok(1)
        })
        .await
        .unwrap_err();

    match err {
        RetryError::Failed(AttemptError::Panicked(p)) => {
            assert_eq!(p.message, "non-string panic payload")
        }
        other => panic!("unexpected {:?}", other),
    }
}
