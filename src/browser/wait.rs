//! Bounded polling for elements that render after the load event

use crate::error::{BookingError, Result};
use std::future::Future;
use std::time::Duration;

const FIRST_INTERVAL: Duration = Duration::from_millis(100);
const MAX_INTERVAL: Duration = Duration::from_secs(1);

/// Poll `probe` until it reports `true` or `timeout` elapses
///
/// Starts at 100ms between probes and doubles up to 1s. Probe errors count
/// as "not yet"; the last one is logged when the wait gives up.
pub async fn poll_until<F, Fut>(what: &str, timeout: Duration, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = tokio::time::Instant::now();
    let mut interval = FIRST_INTERVAL;
    let mut last_error = None;

    loop {
        match probe().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => last_error = Some(e),
        }

        if start.elapsed() >= timeout {
            if let Some(e) = last_error {
                log::debug!("Last probe error while waiting for {}: {}", what, e);
            }
            return Err(BookingError::Timeout {
                what: what.to_string(),
                secs: timeout.as_secs(),
            });
        }

        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(MAX_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_succeeds_after_a_few_probes() {
        let calls = AtomicUsize::new(0);
        let result = poll_until("element", Duration::from_secs(5), || async {
            Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let result = poll_until("heading", Duration::from_secs(3), || async { Ok(false) }).await;

        match result {
            Err(BookingError::Timeout { what, secs }) => {
                assert_eq!(what, "heading");
                assert_eq!(secs, 3);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
