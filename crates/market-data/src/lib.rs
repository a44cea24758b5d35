//! Folio Market Data Crate
//!
//! This crate provides provider-agnostic live price fetching for the
//! portfolio price synchronization.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers: eToro (live API and public API), Twelve Data, Yahoo Finance
//! - Ticker to provider instrument id resolution with persistent mappings
//! - Batched quote fetching with per-provider caps, rate limiting and bounded concurrency
//! - Primary/fallback coordination per ticker
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |   Portfolio      | --> |     Ticker       |  (human symbol)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Resolver      |  (catalog / search / symbol)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  InstrumentId    |  (provider-specific)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  QuoteFetcher    |  (chunks, rate limits)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |     Quote        |  (midpoint or last)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Ticker`] - Upper-cased human symbol
//! - [`InstrumentId`] - Provider-specific instrument identifier
//! - [`Quote`] - Live price with its derivation ([`PriceKind`])
//! - [`FallbackCoordinator`] - Primary-then-fallback pricing per ticker
//!
//! # Type Aliases
//!
//! - [`ProviderId`] - Provider identifier (e.g., "ETORO", "TWELVE_DATA")

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resolver;

// Re-export all public types from models
pub use models::{
    CatalogEntry, InstrumentId, InstrumentMapping, PriceKind, ProviderId, Quote, SearchResult,
    Ticker, ETORO, ETORO_LIVE, TWELVE_DATA, YAHOO,
};

// Re-export error types
pub use errors::{MarketDataError, RetryClass};

// Re-export resolver types
pub use resolver::{InstrumentResolver, MappingStore, MemoryMappingStore, Resolution};

// Re-export provider types
pub use provider::etoro::{
    EtoroLiveProvider, EtoroProvider, OAuthRefresh, TokenManager, TokenSource,
};
pub use provider::twelve_data::TwelveDataProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{
    MarketDataProvider, ProviderCapabilities, RateLimit, ResolutionStrategy, RetryingProvider,
    Watchlist, WatchlistApi,
};

// Re-export registry types
pub use registry::{
    partition, BatchOutcome, CoordinatorOutcome, FallbackCoordinator, InstrumentState,
    QuoteFetcher, QuoteTarget, QuoteValidator, RateLimiter,
};
