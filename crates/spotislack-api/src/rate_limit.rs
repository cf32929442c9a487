//! Rate limiting and adaptive throttling for the Spotify and Slack Web APIs
//!
//! Each service client owns one [`AdaptiveRateLimiter`] shared by every user
//! pipeline, so throttling applies to the service as a whole.
//!
//! ## Architecture
//!
//! - [`TokenBucket`]: token bucket for proactive per-endpoint limiting
//! - [`AdaptiveRateLimiter`]: per-endpoint buckets whose capacity halves on a
//!   429 and recovers slowly on success, plus a service-wide pause honouring
//!   `Retry-After`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use spotislack_api::rate_limit::{AdaptiveRateLimiter, RateLimitConfig};
//!
//! # async fn example() {
//! let limiter = AdaptiveRateLimiter::new(RateLimitConfig::default());
//! limiter.wait_until_resumed().await;
//! limiter.acquire("player").await;
//! // ... make API call ...
//! limiter.on_success("player");
//! # }
//! ```

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// TokenBucket
// ============================================================================

#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    last_refill: Instant,
    /// Capacity after adaptive adjustments
    effective_capacity: u32,
    /// Consecutive successes since the last throttle
    success_count: u64,
}

/// Token bucket rate limiter for a single endpoint.
///
/// Tokens are consumed on each request and refilled at a constant rate.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
                effective_capacity: capacity,
                success_count: 0,
            }),
        }
    }

    fn refill(&self, inner: &mut TokenBucketInner) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_refill).as_secs_f64();
        if elapsed_secs > 0.0 {
            inner.tokens = (inner.tokens + elapsed_secs * self.refill_rate)
                .min(inner.effective_capacity as f64);
            inner.last_refill = now;
        }
    }

    /// Takes one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut inner = lock(&self.inner);
        self.refill(&mut inner);
        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until a token becomes available (0.0 if one is available now).
    pub fn time_until_available(&self) -> f64 {
        let mut inner = lock(&self.inner);
        self.refill(&mut inner);
        if inner.tokens >= 1.0 {
            0.0
        } else if self.refill_rate > 0.0 {
            (1.0 - inner.tokens) / self.refill_rate
        } else {
            f64::MAX
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn effective_capacity(&self) -> u32 {
        lock(&self.inner).effective_capacity
    }

    /// Every 100 consecutive successes, capacity grows by 5% up to the original.
    pub fn on_success(&self) {
        let mut inner = lock(&self.inner);
        inner.success_count += 1;
        if inner.success_count % 100 == 0 && inner.effective_capacity < self.capacity {
            let increase = (inner.effective_capacity as f64 * 0.05).max(1.0) as u32;
            let new_cap = (inner.effective_capacity + increase).min(self.capacity);
            debug!(
                old_capacity = inner.effective_capacity,
                new_capacity = new_cap,
                "Adaptive recovery: increasing bucket capacity"
            );
            inner.effective_capacity = new_cap;
        }
    }

    /// Halves the effective capacity (minimum 1) and resets the success streak.
    pub fn on_throttle(&self) {
        let mut inner = lock(&self.inner);
        let old = inner.effective_capacity;
        inner.effective_capacity = (old / 2).max(1);
        inner.tokens = inner.tokens.min(inner.effective_capacity as f64);
        inner.success_count = 0;
        warn!(
            old_capacity = old,
            new_capacity = inner.effective_capacity,
            "Throttle detected: reducing bucket capacity by 50%"
        );
    }
}

// ============================================================================
// RateLimitConfig
// ============================================================================

/// Configuration for the adaptive rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Bucket capacity (tokens)
    pub capacity: u32,
    /// Refill rate (tokens per second)
    pub refill_rate: f64,
    /// Added on top of every `Retry-After` before calls resume
    pub throttle_margin: Duration,
}

impl Default for RateLimitConfig {
    /// Roughly 3 requests per second sustained with bursts of 50, which keeps
    /// a few hundred users per tick under both providers' documented limits.
    fn default() -> Self {
        Self {
            capacity: 50,
            refill_rate: 3.0,
            throttle_margin: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// AdaptiveRateLimiter
// ============================================================================

/// Adaptive rate limiter for one external service.
///
/// Thread-safe and designed to be shared via `Arc<AdaptiveRateLimiter>`.
pub struct AdaptiveRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    /// While set and in the future, no request to the service may start
    paused_until: Mutex<Option<tokio::time::Instant>>,
    config: RateLimitConfig,
}

impl std::fmt::Debug for AdaptiveRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveRateLimiter")
            .field("config", &self.config)
            .finish()
    }
}

impl AdaptiveRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            paused_until: Mutex::new(None),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    fn with_bucket<F, R>(&self, endpoint: &str, f: F) -> R
    where
        F: FnOnce(&TokenBucket) -> R,
    {
        let mut buckets = lock(&self.buckets);
        let bucket = buckets.entry(endpoint.to_string()).or_insert_with(|| {
            debug!(
                endpoint,
                capacity = self.config.capacity,
                refill_rate = self.config.refill_rate,
                "Creating new token bucket for endpoint"
            );
            TokenBucket::new(self.config.capacity, self.config.refill_rate)
        });
        f(bucket)
    }

    /// Waits for a token for the given endpoint.
    pub async fn acquire(&self, endpoint: &str) {
        loop {
            if self.with_bucket(endpoint, TokenBucket::try_acquire) {
                return;
            }
            let wait_secs = self.with_bucket(endpoint, TokenBucket::time_until_available);
            let wait = Duration::from_secs_f64(wait_secs.clamp(0.01, 60.0));
            debug!(
                endpoint,
                wait_ms = wait.as_millis() as u64,
                "No tokens available, waiting for refill"
            );
            tokio::time::sleep(wait).await;
        }
    }

    pub fn on_success(&self, endpoint: &str) {
        self.with_bucket(endpoint, TokenBucket::on_success);
    }

    /// Records a 429: shrinks the endpoint bucket and pauses the whole
    /// service for `retry_after` plus the configured margin.
    ///
    /// Returns the effective pause.
    pub fn on_throttle(&self, endpoint: &str, retry_after: Duration) -> Duration {
        self.with_bucket(endpoint, TokenBucket::on_throttle);
        let pause = retry_after + self.config.throttle_margin;
        self.pause_for(pause);
        info!(
            endpoint,
            pause_ms = pause.as_millis() as u64,
            "Service throttled, pausing all calls"
        );
        pause
    }

    /// Extends the service-wide pause to at least `now + duration`.
    pub fn pause_for(&self, duration: Duration) {
        let until = tokio::time::Instant::now() + duration;
        let mut paused = lock(&self.paused_until);
        if paused.map_or(true, |current| current < until) {
            *paused = Some(until);
        }
    }

    /// Remaining pause, if the service is currently paused.
    pub fn remaining_pause(&self) -> Option<Duration> {
        let now = tokio::time::Instant::now();
        lock(&self.paused_until)
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Sleeps until any service-wide pause has passed.
    pub async fn wait_until_resumed(&self) {
        // The pause may be extended while we sleep, so re-check afterwards.
        while let Some(remaining) = self.remaining_pause() {
            debug!(
                remaining_ms = remaining.as_millis() as u64,
                "Waiting for service pause to lift"
            );
            tokio::time::sleep(remaining).await;
        }
    }

    pub fn effective_capacity(&self, endpoint: &str) -> Option<u32> {
        lock(&self.buckets)
            .get(endpoint)
            .map(TokenBucket::effective_capacity)
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either an integer number of seconds or an HTTP-date.
/// Falls back to the default duration if parsing fails.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(secs) = u64::try_from(diff.num_seconds()) {
            if secs <= 3600 {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
