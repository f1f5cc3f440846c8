#![cfg(feature = "config")]

use retrying::config::{RetryConfig, RetryOn, StopConfig, WaitConfig};
use retrying::{InstantBlock, StrategyError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("TestError")]
struct TestError;

#[tokio::test]
async fn json_config_drives_a_retryer() {
    let cfg: RetryConfig = serde_json::from_str(
        r#"{
            "stop": { "kind": "after_attempt", "max_attempts": 3 },
            "wait": { "kind": "fixed", "delay_ms": 0 },
            "retry_on": ["failure"]
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.stop, StopConfig::AfterAttempt { max_attempts: 3 });
    assert_eq!(cfg.retry_on, vec![RetryOn::Failure]);

    let retryer = cfg
        .into_builder::<u32, TestError, _>(tokio::runtime::Handle::current())
        .unwrap()
        .with_block_strategy(InstantBlock)
        .build()
        .expect("builder");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let err = retryer
        .call(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.termination().unwrap().number_of_failed_attempts(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn attempt_timeout_is_applied_and_retried() {
    let cfg = RetryConfig {
        stop: StopConfig::AfterAttempt { max_attempts: 2 },
        wait: WaitConfig::None,
        attempt_timeout_ms: Some(20),
        retry_on: vec![RetryOn::Timeout],
    };
    let retryer = cfg
        .into_builder::<u32, TestError, _>(tokio::runtime::Handle::current())
        .unwrap()
        .build()
        .expect("builder");

    let err = retryer
        .call(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await
        .unwrap_err();

    assert!(err.last_cause().unwrap().is_timeout());
    assert_eq!(err.termination().unwrap().number_of_failed_attempts(), 2);
}

#[tokio::test]
async fn zero_timeout_is_rejected() {
    let cfg = RetryConfig { attempt_timeout_ms: Some(0), ..RetryConfig::default() };
    let err = cfg
        .into_builder::<u32, TestError, _>(tokio::runtime::Handle::current())
        .unwrap_err();
    assert_eq!(err, StrategyError::ZeroTimeLimit);
}
