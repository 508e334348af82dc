//! Backoff for outbound calls that can fail transiently.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HttpConfig;

/// Backoff schedule: `base_delay`, then doubling, never above `max_delay`
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Schedule for race page fetches; a pause never outlasts the request timeout
    pub fn from_http(http: &HttpConfig) -> Self {
        Self {
            max_retries: http.retries,
            base_delay: Duration::from_millis(http.retry_base_ms),
            max_delay: Duration::from_secs(http.timeout_secs),
        }
    }

    /// Pause before retry `n` (1-based)
    fn pause_before(&self, n: u32) -> Duration {
        let factor = 1u32.checked_shl(n.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation`, retrying the errors `is_transient` accepts.
///
/// Any other error, or the error of the last allowed attempt, is returned
/// as is.
pub async fn retry_transient<T, E, F, Fut, P>(
    config: &RetryConfig,
    what: &str,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retries = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!("{} succeeded on retry {}", what, retries);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_transient(&err) {
            debug!("{} failed permanently: {}", what, err);
            return Err(err);
        }
        if retries >= config.max_retries {
            return Err(err);
        }

        retries += 1;
        let pause = config.pause_before(retries);
        warn!(
            "{} failed: {}. Retry {}/{} in {:?}",
            what, err, retries, config.max_retries, pause
        );
        sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    fn always(_: &String) -> bool {
        true
    }

    #[tokio::test]
    async fn test_first_success_returned() {
        let result: Result<i32, String> =
            retry_transient(&fast(), "fetch", always, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let result: Result<&str, String> = retry_transient(&fast(), "fetch", always, || {
            let c = calls.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("connection reset".to_string())
                } else {
                    Ok("<html></html>")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "<html></html>");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_after_retries_spent() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let result: Result<(), String> = retry_transient(&fast(), "fetch", always, || {
            let c = calls.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {}", n))
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let result: Result<(), String> = retry_transient(
            &fast(),
            "fetch",
            |e: &String| !e.starts_with("404"),
            || {
                let c = calls.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("404 not found".to_string())
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "404 not found");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pauses_double_up_to_timeout() {
        let config = RetryConfig::from_http(&HttpConfig::default());
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.pause_before(1), Duration::from_millis(250));
        assert_eq!(config.pause_before(2), Duration::from_millis(500));
        assert_eq!(config.pause_before(3), Duration::from_millis(1000));
        assert_eq!(config.pause_before(40), Duration::from_secs(10));
    }
}
