//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited.

use std::time::Duration;

use crate::models::PriceKind;

/// How a provider maps tickers to its own instrument identifiers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolutionStrategy {
    /// One call returns the full catalog; tickers are matched locally.
    Catalog,
    /// One search call per ticker; only exact full-symbol matches count.
    Search,
    /// The ticker is the provider's identifier. No network resolution.
    Symbol,
}

/// Describes the capabilities of a market data provider.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// How tickers are resolved to instrument ids.
    pub resolution: ResolutionStrategy,

    /// Maximum number of instrument ids per quote request.
    pub max_batch_size: usize,

    /// Price convention of the quotes this provider returns.
    pub price_kind: PriceKind,
}

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,

    /// Minimum delay between requests.
    pub min_delay: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            max_concurrency: 5,
            min_delay: Duration::from_millis(100),
        }
    }
}
