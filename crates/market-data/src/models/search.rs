//! Catalog and search result models for ticker resolution.

use serde::{Deserialize, Serialize};

use super::instrument::{InstrumentId, Ticker};

/// One entry of a provider's full instrument catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Provider symbol (e.g. "AAPL", "BTC")
    pub symbol: String,

    /// Provider-specific instrument id
    pub instrument_id: InstrumentId,
}

impl CatalogEntry {
    pub fn new(symbol: impl Into<String>, instrument_id: InstrumentId) -> Self {
        Self {
            symbol: symbol.into(),
            instrument_id,
        }
    }
}

/// Candidate returned by a provider's search endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    /// Full provider symbol (e.g. "AAPL", "AAPL.L")
    pub symbol: String,

    /// Provider-specific instrument id
    pub instrument_id: InstrumentId,

    /// Display name, when the provider sends one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SearchResult {
    pub fn new(symbol: impl Into<String>, instrument_id: InstrumentId) -> Self {
        Self {
            symbol: symbol.into(),
            instrument_id,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Exact full-symbol match. Prefix or fuzzy matches are rejected.
    pub fn is_exact_match(&self, ticker: &Ticker) -> bool {
        ticker.matches(&self.symbol)
    }
}
