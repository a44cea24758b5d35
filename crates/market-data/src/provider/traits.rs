//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{CatalogEntry, InstrumentId, Quote, SearchResult};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source. Each
/// implementation owns its authentication and request shaping; callers only
/// see catalogs, search results and quotes keyed by instrument id.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use folio_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             resolution: ResolutionStrategy::Symbol,
///             max_batch_size: 10,
///             price_kind: PriceKind::Last,
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement fetch_quotes
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "ETORO", "TWELVE_DATA", etc.
    /// Used for logging, rate limiting and mapping persistence.
    fn id(&self) -> &'static str;

    /// Describes how this provider resolves tickers and batches quotes.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch the provider's full instrument catalog.
    ///
    /// Only meaningful for [`ResolutionStrategy::Catalog`](super::ResolutionStrategy::Catalog)
    /// providers. Default implementation returns `NotSupported`.
    async fn fetch_instrument_catalog(&self) -> Result<Vec<CatalogEntry>, MarketDataError> {
        Err(MarketDataError::NotSupported {
            operation: "catalog".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Search candidate instruments for a symbol query.
    ///
    /// Returns the provider's raw candidates; filtering to exact matches is the
    /// resolver's job. Default implementation returns `NotSupported`.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch live quotes for one request's worth of instrument ids.
    ///
    /// `ids` never exceeds `capabilities().max_batch_size`. Instruments the
    /// provider has no price for are simply absent from the returned map;
    /// that is not an error.
    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> Result<HashMap<InstrumentId, Quote>, MarketDataError>;
}
