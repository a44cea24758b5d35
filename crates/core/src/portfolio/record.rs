//! Portfolio record model.

use chrono::{DateTime, Utc};
use folio_market_data::{InstrumentId, Ticker};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One holding as persisted by the dashboard.
///
/// The synchronization only reads `ticker`/`instrument_id` and writes
/// `instrument_id` (once), `price` and `last_updated`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRecord {
    /// Persisted document id.
    pub id: String,
    /// Absent when the document has no usable ticker; such records are skipped.
    pub ticker: Option<Ticker>,
    /// Primary-provider instrument id, set once and never re-resolved.
    pub instrument_id: Option<InstrumentId>,
    pub price: Option<Decimal>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PortfolioRecord {
    pub fn new(id: impl Into<String>, ticker: Option<Ticker>) -> Self {
        Self {
            id: id.into(),
            ticker,
            instrument_id: None,
            price: None,
            last_updated: None,
        }
    }

    pub fn with_instrument_id(mut self, instrument_id: InstrumentId) -> Self {
        self.instrument_id = Some(instrument_id);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.instrument_id.is_some()
    }
}
