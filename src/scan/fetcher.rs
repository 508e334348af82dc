//! HTTP fetching of race pages.

use anyhow::{Context, Result};
use std::time::Duration;

use super::rate_limiter::RateLimiter;
use crate::config::HttpConfig;
use crate::retry::{retry_transient, RetryConfig};

/// Rate-limited, retrying page client
pub struct PageFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    retry: RetryConfig,
}

impl PageFetcher {
    pub fn from_config(http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(&http.user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            limiter: RateLimiter::from_config(http),
            retry: RetryConfig::from_http(http),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch a page body; only transient failures are tried again
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let client = &self.client;
        let limiter = &self.limiter;
        let what = format!("GET {}", url);
        let body = retry_transient(&self.retry, &what, is_transient, || async move {
            // Every attempt waits for its own slot
            limiter.acquire().await;
            let response = client.get(url).send().await?.error_for_status()?;
            response.text().await
        })
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

        tracing::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

/// Transport failures, server errors and 429 may clear up; other statuses will not
fn is_transient(err: &reqwest::Error) -> bool {
    match err.status() {
        Some(status) => {
            status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        }
        None => !err.is_builder(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    pub(crate) const RACE_PAGE: &str = "<html><body>\
        <h1>Prix de Vincennes</h1><p>Départ 13h50</p>\
        <div>1</div><div>BOLD EAGLE</div><div>4.5</div>\
        <div>2</div><div>FACE TIME</div><div>1.8</div>\
        </body></html>";

    /// Local race site with one card and one missing page
    pub(crate) async fn spawn_race_site() -> String {
        let app = Router::new()
            .route("/courses/prix-de-vincennes/partants", get(|| async { RACE_PAGE }))
            .route(
                "/courses/broken/partants",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub(crate) fn test_fetcher() -> PageFetcher {
        let http = HttpConfig {
            requests_per_minute: 600,
            min_interval_secs: 0.0,
            ..Default::default()
        };
        PageFetcher::from_config(&http).unwrap().with_retry(RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
        })
    }

    /// Site whose only page answers `status`; returns its URL and a hit counter
    async fn spawn_failing_page(status: StatusCode) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/courses/failing/partants",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, "nope")
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/courses/failing/partants", addr), hits)
    }

    #[tokio::test]
    async fn test_fetch_page() {
        let base = spawn_race_site().await;
        let body = test_fetcher()
            .fetch(&format!("{}/courses/prix-de-vincennes/partants", base))
            .await
            .unwrap();
        assert!(body.contains("BOLD EAGLE"));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let base = spawn_race_site().await;
        let err = test_fetcher()
            .fetch(&format!("{}/courses/broken/partants", base))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to fetch"));
    }

    #[tokio::test]
    async fn test_missing_page_fails_without_retry() {
        let (url, hits) = spawn_failing_page(StatusCode::NOT_FOUND).await;
        let err = test_fetcher().fetch(&url).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to fetch"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let (url, hits) = spawn_failing_page(StatusCode::SERVICE_UNAVAILABLE).await;
        assert!(test_fetcher().fetch(&url).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_schedule_from_http_config() {
        let fetcher = PageFetcher::from_config(&HttpConfig::default()).unwrap();
        assert_eq!(fetcher.retry.max_retries, 2);
        assert_eq!(fetcher.retry.base_delay, Duration::from_millis(250));
    }
}
