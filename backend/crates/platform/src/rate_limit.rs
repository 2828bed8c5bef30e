//! Rate Limiting Infrastructure
//!
//! Fixed-window request counter per (operation, client IP), stored in a
//! [`KeyValueStore`] with the window length as the key's expiry.
//!
//! ## Known limitations
//! - Fixed window, not sliding: a burst straddling a window boundary can be
//!   admitted up to `2 × max_requests` times.
//! - The existence check and the first `set` are separate round trips; two
//!   concurrent first requests can admit one call beyond the limit.

use std::sync::Arc;
use std::time::Duration;

use crate::kv::{KeyValueStore, StoreError, StoreResult};

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Successful calls allowed per window
    pub max_requests: u32,
    /// Window length, also the counter's expiry
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Counter value after this call (unchanged when rejected)
    pub count: i64,
    pub remaining: u32,
}

impl RateLimitResult {
    fn allowed(count: i64, max: u32) -> Self {
        Self {
            allowed: true,
            count,
            remaining: (i64::from(max) - count).max(0) as u32,
        }
    }

    fn rejected(count: i64) -> Self {
        Self {
            allowed: false,
            count,
            remaining: 0,
        }
    }
}

/// Fixed-window limiter over an injected store
pub struct FixedWindowLimiter<S> {
    store: Arc<S>,
    namespace: String,
}

impl<S> Clone for FixedWindowLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
        }
    }
}

impl<S> FixedWindowLimiter<S>
where
    S: KeyValueStore + Sync,
{
    pub fn new(store: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// `{namespace}{operation}:{ip}`
    pub fn key(&self, operation: &str, ip: &str) -> String {
        format!("{}{}:{}", self.namespace, operation, ip)
    }

    /// Count one call of `operation` from `ip` against `config`.
    ///
    /// The first call of a window stores `1` with the window as expiry. A call
    /// that finds the counter already at `max_requests` is rejected and does
    /// not increment, so exactly `max_requests` calls succeed per window.
    pub async fn check(
        &self,
        operation: &str,
        ip: &str,
        config: &RateLimitConfig,
    ) -> StoreResult<RateLimitResult> {
        if config.max_requests == 0 {
            return Ok(RateLimitResult::rejected(0));
        }

        let key = self.key(operation, ip);

        if !self.store.exists(&key).await? {
            self.store.set(&key, "1", Some(config.window)).await?;
            tracing::debug!(key = %key, "Rate limit window opened");
            return Ok(RateLimitResult::allowed(1, config.max_requests));
        }

        let count = match self.store.get(&key).await? {
            Some(raw) => raw.parse::<i64>().map_err(|e| StoreError::Malformed {
                key: key.clone(),
                reason: e.to_string(),
            })?,
            // Expired between the two calls; the next request opens a new window
            None => return Ok(RateLimitResult::allowed(0, config.max_requests)),
        };

        if count >= i64::from(config.max_requests) {
            tracing::warn!(
                operation = operation,
                ip = ip,
                count = count,
                max = config.max_requests,
                "Rate limit exceeded"
            );
            return Ok(RateLimitResult::rejected(count));
        }

        match self.store.incr_if_exists(&key).await? {
            Some(count) => Ok(RateLimitResult::allowed(count, config.max_requests)),
            None => {
                tracing::debug!(key = %key, "Rate limit window expired before increment");
                Ok(RateLimitResult::allowed(0, config.max_requests))
            }
        }
    }
}
