use retrying::{stop, time_limit, InstantBlock, Retryer, TracingListener};
use std::time::Duration;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, thiserror::Error)]
#[error("flaky dependency")]
struct TestError;

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test(flavor = "current_thread")]
async fn tracing_listener_and_engine_emit_structured_events() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(captured.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let retryer = Retryer::<(), TestError>::builder()
        .retry_if_failure()
        .with_stop_strategy(stop::after_attempt(2).unwrap())
        .with_block_strategy(InstantBlock)
        .with_retry_listener(TracingListener::new("fetch"))
        .build()
        .expect("builder");

    let _ = retryer.call(|| async { Err(TestError) }).await;

    let logs = captured.contents();
    assert!(logs.contains("attempt failed"), "{logs}");
    assert!(logs.contains("operation=\"fetch\""), "{logs}");
    assert!(logs.contains("error=flaky dependency"), "{logs}");
    assert!(logs.contains("waiting before retry"), "{logs}");
    assert!(logs.contains("stop strategy ended retrying"), "{logs}");
}

#[tokio::test(start_paused = true)]
async fn time_limit_expiry_logs_the_limit() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(captured.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let retryer = Retryer::<(), TestError>::builder()
        .with_attempt_time_limiter(
            time_limit::fixed(Duration::from_millis(20), tokio::runtime::Handle::current())
                .unwrap(),
        )
        .build()
        .expect("builder");

    let err = retryer
        .call(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.last_cause().unwrap().is_timeout());
    let logs = captured.contents();
    assert!(logs.contains("attempt exceeded its time limit"), "{logs}");
    assert!(logs.contains("limit_ms=20"), "{logs}");
}
