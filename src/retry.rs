//! Bounded retry for page actions such as form submission

use std::fmt::Display;
use std::future::Future;

/// Run `op` up to `attempts` times, returning the first success or the last error
///
/// An error for which `retryable` returns false is returned at once.
pub async fn retry<T, E, F, Fut, R>(
    attempts: usize,
    what: &str,
    retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && retryable(&e) => {
                log::warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = retry(2, "submit", |_: &String| true, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err("no navigation".to_string())
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry(2, "submit", |_: &String| true, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("still broken".to_string())
        })
        .await;

        assert_eq!(result, Err("still broken".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_zero_attempts_runs_once() {
        let calls = AtomicUsize::new(0);
        let _: Result<(), String> = retry(0, "noop", |_: &String| true, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("x".to_string())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_on_unretryable_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry(
            3,
            "submit",
            |e: &String| !e.starts_with("captcha"),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("captcha shown".to_string())
            },
        )
        .await;

        assert_eq!(result, Err("captcha shown".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
