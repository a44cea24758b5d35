//! eToro API payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::InstrumentId;

/// Instrument ids arrive as JSON numbers from most endpoints, strings from a few.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for InstrumentId {
    fn from(value: RawId) -> Self {
        match value {
            RawId::Number(n) => InstrumentId::from(n),
            RawId::Text(s) => InstrumentId::new(s),
        }
    }
}

// ============================================================================
// Public API (api key pair)
// ============================================================================

/// Response from /market-data/search
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchItem {
    pub instrument_id: Option<RawId>,
    pub internal_symbol_full: Option<String>,
    #[serde(alias = "displayname")]
    pub instrument_display_name: Option<String>,
}

/// Response from /market-data/instruments/rates
#[derive(Debug, Deserialize)]
pub(crate) struct RatesResponse {
    #[serde(default)]
    pub rates: Vec<Rate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Rate {
    #[serde(rename = "instrumentID", alias = "instrumentId")]
    pub instrument_id: Option<RawId>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

// ============================================================================
// Live API (OAuth bearer)
// ============================================================================

/// Response from the instrument metadata endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InstrumentCatalogResponse {
    #[serde(default)]
    pub instrument_display_datas: Vec<InstrumentDisplayData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstrumentDisplayData {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: Option<RawId>,
    #[serde(rename = "SymbolFull")]
    pub symbol_full: Option<String>,
}

/// Response from the /Live rates endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LiveRatesResponse {
    #[serde(default)]
    pub rates: Vec<LiveRate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LiveRate {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: Option<RawId>,
    #[serde(rename = "Bid")]
    pub bid: Option<Decimal>,
    #[serde(rename = "Ask")]
    pub ask: Option<Decimal>,
}

// ============================================================================
// Watchlists
// ============================================================================

/// `GET /watchlists` has been seen both as a bare array and wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WatchlistsResponse {
    Bare(Vec<WatchlistPayload>),
    Wrapped { watchlists: Vec<WatchlistPayload> },
}

impl WatchlistsResponse {
    pub fn into_vec(self) -> Vec<WatchlistPayload> {
        match self {
            Self::Bare(lists) => lists,
            Self::Wrapped { watchlists } => watchlists,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchlistPayload {
    #[serde(alias = "watchlistId")]
    pub id: RawId,
    pub name: String,
    #[serde(default)]
    pub items: Vec<WatchlistItemPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchlistItemPayload {
    #[serde(alias = "itemId")]
    pub instrument_id: Option<RawId>,
}

/// Body of `POST /watchlists/{id}/items`: a bare array of numeric ids.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub(crate) struct AddItemsRequest(pub Vec<i64>);
