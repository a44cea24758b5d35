//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Concrete provider implementations (eToro, Twelve Data, Yahoo)
//! - The `RetryingProvider` decorator
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The sync engine only sees tickers, instrument ids and quotes
//! - **Extensible**: New providers can be added by implementing `MarketDataProvider`
//! - **Resilient**: Rate limiting and retry classification protect against provider failures
//!
//! # Identifier Resolution
//!
//! Providers declare how tickers map to their ids via [`ResolutionStrategy`].
//! The mapping itself happens in the resolver module, not in the providers.

mod capabilities;
pub(crate) mod http;
mod retry;
mod traits;
mod watchlist;

pub mod etoro;
pub mod twelve_data;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit, ResolutionStrategy};
pub use retry::RetryingProvider;
pub use traits::MarketDataProvider;
pub use watchlist::{Watchlist, WatchlistApi};
