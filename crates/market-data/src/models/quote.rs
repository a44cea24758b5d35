use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::InstrumentId;
use super::types::ProviderId;

/// How a quote's price was derived.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceKind {
    /// Arithmetic mean of best bid and best ask.
    Midpoint,
    /// Provider's direct price field (last trade / latest close).
    Last,
}

/// Live price for one instrument, as supplied by one provider.
///
/// Ephemeral: only `price` ever lands on a portfolio record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub instrument_id: InstrumentId,
    pub price: Decimal,
    pub kind: PriceKind,
    pub provider: ProviderId,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Quote from a provider's direct price field.
    pub fn last(
        instrument_id: InstrumentId,
        price: Decimal,
        provider: impl Into<ProviderId>,
    ) -> Self {
        Self {
            instrument_id,
            price,
            kind: PriceKind::Last,
            provider: provider.into(),
            timestamp: Utc::now(),
        }
    }

    /// Quote priced at the bid/ask midpoint.
    ///
    /// Returns `None` unless both sides are strictly positive; a one-sided book
    /// has no meaningful midpoint.
    pub fn midpoint(
        instrument_id: InstrumentId,
        bid: Decimal,
        ask: Decimal,
        provider: impl Into<ProviderId>,
    ) -> Option<Self> {
        if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            instrument_id,
            price: ((bid + ask) / Decimal::TWO).normalize(),
            kind: PriceKind::Midpoint,
            provider: provider.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
