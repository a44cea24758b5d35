//! Token bucket rate limiter for market data providers.
//!
//! Implements per-provider rate limiting using the token bucket algorithm.
//! Each provider gets its own bucket with configurable capacity and refill rate,
//! plus a minimum spacing between consecutive requests.
//!
//! One limiter instance is shared by everything that talks to a provider
//! (resolution searches and quote batches draw from the same bucket).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::models::ProviderId;
use crate::provider::RateLimit;

/// Default rate limit: 60 requests per minute.
const DEFAULT_REQUESTS_PER_MINUTE: f64 = 60.0;

/// Default bucket capacity (allows bursting).
const DEFAULT_BUCKET_CAPACITY: f64 = 10.0;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
    /// Minimum spacing between two grants.
    min_delay: Duration,
    /// Earliest instant the next grant may happen.
    next_slot: Instant,
}

impl TokenBucket {
    fn from_config(config: &RateLimitConfig) -> Self {
        let now = Instant::now();
        Self {
            tokens: config.burst_capacity,
            last_update: now,
            rate: config.requests_per_minute.max(1) as f64 / 60.0,
            capacity: config.burst_capacity,
            min_delay: config.min_delay,
            next_slot: now,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        let new_tokens = elapsed * self.rate;

        self.tokens = (self.tokens + new_tokens).min(self.capacity);
        self.last_update = now;
    }

    /// Try to acquire a token immediately.
    /// Returns true if a token was available and the spacing was respected.
    fn try_acquire(&mut self) -> bool {
        self.refill();

        let now = Instant::now();
        if now < self.next_slot || self.tokens < 1.0 {
            return false;
        }

        self.tokens -= 1.0;
        self.next_slot = now + self.min_delay;
        true
    }

    /// Calculate the wait time until a grant becomes possible.
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        let spacing = self.next_slot.saturating_duration_since(Instant::now());
        let refill = if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        };
        spacing.max(refill)
    }
}

/// Rate limiter configuration for a provider.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum requests per minute.
    pub requests_per_minute: u32,
    /// Maximum burst capacity.
    pub burst_capacity: f64,
    /// Minimum delay between consecutive requests.
    pub min_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE as u32,
            burst_capacity: DEFAULT_BUCKET_CAPACITY,
            min_delay: Duration::ZERO,
        }
    }
}

impl From<&RateLimit> for RateLimitConfig {
    fn from(limit: &RateLimit) -> Self {
        Self {
            requests_per_minute: limit.requests_per_minute,
            burst_capacity: limit.max_concurrency.max(1) as f64,
            min_delay: limit.min_delay,
        }
    }
}

/// Token bucket rate limiter for multiple providers.
///
/// Thread-safe rate limiter that maintains per-provider token buckets.
/// Buckets are created on-demand with default settings, or can be
/// pre-configured with custom limits.
pub struct RateLimiter {
    /// Per-provider token buckets.
    buckets: Mutex<HashMap<String, TokenBucket>>,
    /// Per-provider configuration overrides.
    configs: Mutex<HashMap<String, RateLimitConfig>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default settings.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Lock the configs mutex, recovering from poison if necessary.
    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimitConfig>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure rate limits for a specific provider.
    pub fn configure(&self, provider: &ProviderId, config: RateLimitConfig) {
        let mut configs = self.lock_configs();
        configs.insert(provider.to_string(), config);
        drop(configs); // Release configs lock before acquiring buckets lock

        // Reset the bucket if it already exists
        let mut buckets = self.lock_buckets();
        buckets.remove(provider.as_ref());
    }

    /// Configures a provider from its declared [`RateLimit`], unless it is
    /// already configured. Safe to call from every component that talks to it.
    pub fn register(&self, provider: &ProviderId, limit: &RateLimit) {
        let mut configs = self.lock_configs();
        if !configs.contains_key(provider.as_ref()) {
            debug!(
                "Rate limiter: registering '{}' ({} req/min, min delay {:?})",
                provider, limit.requests_per_minute, limit.min_delay
            );
            configs.insert(provider.to_string(), RateLimitConfig::from(limit));
        }
    }

    /// Acquire a token for the given provider.
    ///
    /// This method will wait (asynchronously) until a token is available
    /// and the provider's minimum spacing has elapsed.
    pub async fn acquire(&self, provider: &ProviderId) {
        loop {
            let wait_time = {
                let mut buckets = self.lock_buckets();

                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| self.create_bucket(provider));

                if bucket.try_acquire() {
                    debug!("Rate limiter: acquired token for '{}'", provider);
                    return;
                }

                bucket.time_until_available()
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, provider
            );
            tokio::time::sleep(wait_time.max(Duration::from_millis(1))).await;
        }
    }

    /// Try to acquire a token without waiting.
    ///
    /// Returns true if a token was acquired, false if rate limited.
    pub fn try_acquire(&self, provider: &ProviderId) -> bool {
        let mut buckets = self.lock_buckets();

        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| self.create_bucket(provider));

        bucket.try_acquire()
    }

    /// Create a bucket for a provider, using custom config if available.
    fn create_bucket(&self, provider: &ProviderId) -> TokenBucket {
        let configs = self.lock_configs();

        match configs.get(provider.as_ref()) {
            Some(config) => TokenBucket::from_config(config),
            None => TokenBucket::from_config(&RateLimitConfig::default()),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
