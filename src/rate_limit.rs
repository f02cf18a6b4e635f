//! Rate limiting for the checkout route.
//!
//! Limits are applied per `route:client` key, where the client identity is
//! the first `x-forwarded-for` entry or the transport peer address. The
//! backend is selected at startup: a Redis counter when `REDIS_URL` is set
//! (cluster-wide), otherwise an in-process map. The in-process fallback
//! applies the quota per-process, not cluster-wide; that only weakens
//! throttling, never payment correctness.
//!
//! A backend failure also fails open for the same reason: dropping a
//! request on a broken counter would trade availability for nothing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

use crate::config::RateLimitConfig;

/// Outcome of a quota check. `reset_at_ms` is an epoch timestamp so callers
/// can surface a deterministic backoff to clients.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl RateDecision {
    /// Seconds until the window resets, rounded up. Never exceeds the
    /// configured window length.
    pub fn retry_after_secs(&self) -> u64 {
        let now = Utc::now().timestamp_millis();
        let remaining_ms = (self.reset_at_ms - now).max(0) as u64;
        remaining_ms.div_ceil(1000)
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateDecision;
}

struct Window {
    count: u32,
    reset_at_ms: i64,
}

/// Per-process fixed-window counter.
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window_ms: i64,
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        assert!(config.max_requests > 0, "Rate limit must be greater than 0");
        Self {
            max_requests: config.max_requests,
            window_ms: config.window_secs as i64 * 1000,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        let now = Utc::now().timestamp_millis();
        let mut windows = self.windows.lock().expect("rate limit map poisoned");

        // Sweep dead windows so the map tracks active clients, not every
        // key ever seen
        windows.retain(|_, w| w.reset_at_ms > now);

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at_ms: now + self.window_ms,
        });

        if window.count >= self.max_requests {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at_ms: window.reset_at_ms,
            };
        }

        window.count += 1;
        RateDecision {
            allowed: true,
            remaining: self.max_requests - window.count,
            reset_at_ms: window.reset_at_ms,
        }
    }
}

/// Redis-backed counter shared across processes.
///
/// INCR and the initial PEXPIRE run in one script so the window start is
/// atomic under concurrent access.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    script: redis::Script,
    max_requests: u32,
    window_ms: i64,
}

const COUNTER_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
return {count, ttl}
"#;

impl RedisRateLimiter {
    pub async fn connect(
        url: &str,
        config: &RateLimitConfig,
    ) -> Result<Self, redis::RedisError> {
        assert!(config.max_requests > 0, "Rate limit must be greater than 0");
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            script: redis::Script::new(COUNTER_SCRIPT),
            max_requests: config.max_requests,
            window_ms: config.window_secs as i64 * 1000,
        })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        let mut conn = self.conn.clone();
        let result: Result<(i64, i64), _> = self
            .script
            .key(format!("rl:{}", key))
            .arg(self.window_ms)
            .invoke_async(&mut conn)
            .await;

        let now = Utc::now().timestamp_millis();
        match result {
            Ok((count, ttl_ms)) => {
                let ttl_ms = if ttl_ms > 0 { ttl_ms } else { self.window_ms };
                RateDecision {
                    allowed: count <= self.max_requests as i64,
                    remaining: (self.max_requests as i64 - count).max(0) as u32,
                    reset_at_ms: now + ttl_ms,
                }
            }
            Err(e) => {
                tracing::warn!("Rate limit backend unavailable, failing open: {}", e);
                RateDecision {
                    allowed: true,
                    remaining: 0,
                    reset_at_ms: now + self.window_ms,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn limiter(max_requests: u32, window_secs: u64) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs,
        })
    }

    #[tokio::test]
    async fn test_quota_exhaustion() {
        let limiter = limiter(5, 60);
        for i in 0..5 {
            let decision = limiter.check("checkout:1.2.3.4").await;
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 4 - i);
        }

        let denied = limiter.check("checkout:1.2.3.4").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after_secs() <= 60);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("checkout:1.2.3.4").await.allowed);
        assert!(!limiter.check("checkout:1.2.3.4").await.allowed);
        assert!(limiter.check("checkout:5.6.7.8").await.allowed);
    }

    #[tokio::test]
    async fn test_window_reset() {
        let limiter = limiter(1, 0);
        assert!(limiter.check("checkout:1.2.3.4").await.allowed);
        // zero-length window: the next check starts a fresh one
        assert!(limiter.check("checkout:1.2.3.4").await.allowed);
    }

    #[tokio::test]
    async fn test_expired_windows_are_evicted() {
        let limiter = limiter(1, 0);
        for i in 0..50 {
            limiter.check(&format!("checkout:10.0.0.{}", i)).await;
        }
        // zero-length windows are all dead by the next check, so only the
        // entry for this call survives the sweep
        limiter.check("checkout:10.0.0.99").await;
        assert_eq!(limiter.windows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_does_not_block() {
        let limiter = limiter(5, 60);
        let start = Instant::now();
        limiter.check("checkout:1.2.3.4").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
