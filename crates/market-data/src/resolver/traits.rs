//! Resolution traits for the market data crate.
//!
//! Defines the mapping persistence seam and the outcome of resolving a
//! ticker against one provider.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, InstrumentMapping, Ticker};

/// Outcome of resolving one ticker against one provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// Mapping was already stored; no network call was made.
    Cached(InstrumentId),
    /// Resolved now and persisted (or at least attempted to).
    Resolved(InstrumentId),
    /// The provider has no exact match for the ticker.
    NotFound,
}

impl Resolution {
    pub fn instrument_id(&self) -> Option<&InstrumentId> {
        match self {
            Self::Cached(id) | Self::Resolved(id) => Some(id),
            Self::NotFound => None,
        }
    }

    pub fn into_instrument_id(self) -> Option<InstrumentId> {
        match self {
            Self::Cached(id) | Self::Resolved(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

/// Persistence for ticker -> instrument id mappings, scoped per provider.
///
/// Implementations must keep at most one mapping per `(provider, ticker)`.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Looks up a stored mapping.
    async fn get(
        &self,
        provider: &str,
        ticker: &Ticker,
    ) -> Result<Option<InstrumentId>, MarketDataError>;

    /// Stores the mapping unless one already exists for `(provider, ticker)`.
    ///
    /// Returns the id that is stored afterwards: the new one, or the existing
    /// one when a mapping was already present.
    async fn put(&self, mapping: &InstrumentMapping) -> Result<InstrumentId, MarketDataError>;
}
