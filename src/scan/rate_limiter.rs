//! Request pacing for race page fetches.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::HttpConfig;

/// Hands out send slots at least `interval` apart.
///
/// An idle limiter builds up no credit: after a quiet spell the next request
/// goes out at once and the spacing resumes from there.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, min_interval: Duration) -> Self {
        let per_request = Duration::from_secs(60) / requests_per_minute.max(1);
        Self {
            interval: per_request.max(min_interval),
            next_slot: Mutex::new(None),
        }
    }

    pub fn from_config(http: &HttpConfig) -> Self {
        let min_interval =
            Duration::try_from_secs_f64(http.min_interval_secs).unwrap_or(Duration::ZERO);
        Self::new(http.requests_per_minute, min_interval)
    }

    /// Claim the earliest free slot not before `now`
    async fn reserve(&self, now: Instant) -> Instant {
        let mut next = self.next_slot.lock().await;
        let slot = next.map_or(now, |free| free.max(now));
        *next = Some(slot + self.interval);
        slot
    }

    /// Wait for this request's slot
    pub async fn acquire(&self) {
        let slot = self.reserve(Instant::now()).await;
        tracing::trace!("Next request slot in {:?}", slot.saturating_duration_since(Instant::now()));
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slots_spaced_by_rate() {
        let limiter = RateLimiter::new(30, Duration::ZERO);
        let now = Instant::now();
        assert_eq!(limiter.reserve(now).await, now);
        assert_eq!(limiter.reserve(now).await, now + Duration::from_secs(2));
        assert_eq!(limiter.reserve(now).await, now + Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_min_interval_wins_over_fast_rate() {
        let limiter = RateLimiter::new(600, Duration::from_millis(500));
        let now = Instant::now();
        limiter.reserve(now).await;
        assert_eq!(limiter.reserve(now).await, now + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_idle_time_not_banked() {
        let limiter = RateLimiter::new(60, Duration::ZERO);
        let now = Instant::now();
        limiter.reserve(now).await;

        let later = now + Duration::from_secs(30);
        assert_eq!(limiter.reserve(later).await, later);
        assert_eq!(limiter.reserve(later).await, later + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_acquire_fast_rate() {
        let limiter = RateLimiter::new(6000, Duration::ZERO);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_bad_interval_from_config_ignored() {
        let http = HttpConfig {
            requests_per_minute: 60,
            min_interval_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(RateLimiter::from_config(&http).interval, Duration::from_secs(1));
    }
}
