//! Fixed-window request limiter keyed by client address.
//!
//! Counters live in process memory only: they reset on restart and are not
//! shared between replicas.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::activity::client_ip;
use crate::errors::AppError;

const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(name: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    /// Counts one request for `key`. Returns the seconds until the window
    /// resets when the limit is exceeded.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();

        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            return Err(remaining.as_secs().max(1));
        }

        entry.count += 1;
        Ok(())
    }

    fn prune(&self, now: Instant) {
        let window = self.window;
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Per-route-group limiters.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub auth: Arc<RateLimiter>,
    pub ai: Arc<RateLimiter>,
    pub uploads: Arc<RateLimiter>,
}

impl Default for RateLimits {
    fn default() -> Self {
        let minute = Duration::from_secs(60);
        Self {
            auth: Arc::new(RateLimiter::new("auth", 10, minute)),
            ai: Arc::new(RateLimiter::new("ai", 20, minute)),
            uploads: Arc::new(RateLimiter::new("uploads", 30, minute)),
        }
    }
}

/// Middleware: rejects the request with 429 once the caller's window is full.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string());

    if let Err(retry_after_secs) = limiter.check(&key) {
        warn!(
            "Rate limit '{}' exceeded for {key} ({} per {:?})",
            limiter.name, limiter.limit, limiter.window
        );
        return Err(AppError::RateLimited { retry_after_secs });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new("test", 3, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        let retry = limiter.check("a").unwrap_err();
        assert!(retry >= 1 && retry <= 60);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new("test", 1, Duration::from_millis(30));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("a").is_ok());
    }

    #[test]
    fn test_prune_drops_expired_windows() {
        let limiter = RateLimiter::new("test", 5, Duration::from_millis(10));
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        limiter.prune(Instant::now());
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
