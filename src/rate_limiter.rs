use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Fixed-window request counter keyed by an arbitrary identifier (client IP, email)
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, WindowEntry>>>,
    max_requests: u32,
    window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Outcome of a single rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Whole seconds a rejected client should wait, never zero
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_after.as_secs_f64().ceil().max(1.0) as u64
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request for `identifier` and report whether it is within the limit
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, Instant::now()).await
    }

    pub async fn check_at(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.write().await;

        let entry = windows.entry(identifier.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        let mut elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= self.window {
            entry.count = 0;
            entry.window_start = now;
            elapsed = Duration::ZERO;
        }

        let reset_after = self.window - elapsed;

        if entry.count >= self.max_requests {
            debug!(
                identifier = %identifier,
                count = entry.count,
                limit = self.max_requests,
                "Rate limit exceeded"
            );
            return RateLimitDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - entry.count,
            reset_after,
        }
    }

    /// Remove windows that have fully elapsed, returning how many were dropped
    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now()).await
    }

    pub async fn cleanup_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, entry| now.saturating_duration_since(entry.window_start) < self.window);
        let removed = before - windows.len();

        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Removed expired rate-limit windows");
        }
        removed
    }

    /// Number of identifiers currently holding a window
    pub async fn tracked_identifiers(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Sweep expired windows on a fixed interval until the runtime shuts down
    pub fn spawn_cleanup_task(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        info!(interval_secs = every.as_secs(), "Starting rate-limit cleanup task");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.cleanup().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_request_beyond_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("10.0.0.1", now).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let rejected = limiter.check_at("10.0.0.1", now + Duration::from_secs(10)).await;
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_after, Duration::from_secs(50));
        assert_eq!(rejected.retry_after_secs(), 50);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("alice@example.com", now).await.allowed);
        assert!(!limiter.check_at("alice@example.com", now).await.allowed);
        assert!(limiter.check_at("bob@example.com", now).await.allowed);
    }

    #[tokio::test]
    async fn test_new_window_after_expiry() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("client", now).await.allowed);
        assert!(limiter.check_at("client", now).await.allowed);
        assert!(!limiter.check_at("client", now + Duration::from_secs(59)).await.allowed);

        let reopened = limiter.check_at("client", now + Duration::from_secs(60)).await;
        assert!(reopened.allowed);
        assert_eq!(reopened.remaining, 1);
    }

    #[tokio::test]
    async fn test_cleanup_drops_only_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let now = Instant::now();

        limiter.check_at("old", now).await;
        limiter.check_at("fresh", now + Duration::from_secs(30)).await;
        assert_eq!(limiter.tracked_identifiers().await, 2);

        let removed = limiter.cleanup_at(now + Duration::from_secs(61)).await;
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_identifiers().await, 1);
    }
}
