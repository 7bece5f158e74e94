//! Sliding-window rate limiter
//!
//! Counts events per string key inside a trailing time window. Used for
//! failed logins (per email) and contact form submissions (per IP hash).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Failed logins allowed per email inside [`LOGIN_WINDOW_MINUTES`]
pub const LOGIN_MAX_ATTEMPTS: usize = 5;
pub const LOGIN_WINDOW_MINUTES: i64 = 15;

pub struct RateLimiter {
    max_events: usize,
    window: Duration,
    events: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            events: RwLock::new(HashMap::new()),
        }
    }

    /// 5 failed attempts per 15 minutes
    pub fn for_login() -> Self {
        Self::new(LOGIN_MAX_ATTEMPTS, Duration::minutes(LOGIN_WINDOW_MINUTES))
    }

    /// `max_per_hour` events per rolling hour
    pub fn per_hour(max_per_hour: usize) -> Self {
        Self::new(max_per_hour, Duration::hours(1))
    }

    fn normalize(key: &str) -> String {
        key.trim().to_lowercase()
    }

    /// Whether `key` has used up its allowance
    pub async fn is_limited(&self, key: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        match events.get_mut(&Self::normalize(key)) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.max_events
            }
            None => false,
        }
    }

    /// Count one event for `key`
    pub async fn record(&self, key: &str) {
        let mut events = self.events.write().await;
        events
            .entry(Self::normalize(key))
            .or_default()
            .push(Utc::now());
    }

    /// Record an event unless the key is already limited.
    ///
    /// Returns `false` (and records nothing) when limited.
    pub async fn check_and_record(&self, key: &str) -> bool {
        let now = Utc::now();
        let cutoff = now - self.window;
        let mut events = self.events.write().await;
        let times = events.entry(Self::normalize(key)).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= self.max_events {
            return false;
        }
        times.push(now);
        true
    }

    /// Forget all events for `key`
    pub async fn clear(&self, key: &str) {
        self.events.write().await.remove(&Self::normalize(key));
    }

    /// Drop expired events and empty keys
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        events.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    pub async fn tracked_keys(&self) -> usize {
        self.events.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_limit() {
        let limiter = RateLimiter::for_login();
        for _ in 0..4 {
            limiter.record("ada@example.com").await;
            assert!(!limiter.is_limited("ada@example.com").await);
        }
        limiter.record("ada@example.com").await;
        assert!(limiter.is_limited("ada@example.com").await);

        limiter.clear("ada@example.com").await;
        assert!(!limiter.is_limited("ada@example.com").await);
    }

    #[tokio::test]
    async fn test_keys_are_case_insensitive() {
        let limiter = RateLimiter::new(2, Duration::minutes(1));
        limiter.record("Key").await;
        limiter.record("KEY ").await;
        assert!(limiter.is_limited("key").await);
        assert!(!limiter.is_limited("other").await);
    }

    #[tokio::test]
    async fn test_check_and_record() {
        let limiter = RateLimiter::per_hour(2);
        assert!(limiter.check_and_record("ip").await);
        assert!(limiter.check_and_record("ip").await);
        assert!(!limiter.check_and_record("ip").await);
        assert!(limiter.check_and_record("other-ip").await);
    }

    #[tokio::test]
    async fn test_window_expiry_and_cleanup() {
        let limiter = RateLimiter::new(1, Duration::milliseconds(20));
        limiter.record("k").await;
        assert!(limiter.is_limited("k").await);

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert!(!limiter.is_limited("k").await);

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
