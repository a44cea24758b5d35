//! Field layout of portfolio documents and the defaulting rules applied when
//! reading them.
//!
//! Documents are written by the dashboard, so any field may be missing or
//! carry an unexpected type. Every rule lives here:
//!
//! - ticker: trimmed and upper-cased; blank or non-string means none
//! - instrument id: integer or string; `0` or blank means none
//! - price: integer or double; anything else means none
//! - last updated: RFC 3339 string; anything else means none

use chrono::{DateTime, Utc};
use folio_market_data::{InstrumentId, Ticker};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::PortfolioRecord;

pub const DEFAULT_TICKER_FIELD: &str = "nome";
pub const DEFAULT_INSTRUMENT_ID_FIELD: &str = "instrumentId";
pub const DEFAULT_PRICE_FIELD: &str = "prezzo_corrente";
pub const DEFAULT_UPDATED_AT_FIELD: &str = "lastUpdated";

/// Names of the document fields the synchronization touches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSchema {
    pub ticker_field: String,
    pub instrument_id_field: String,
    pub price_field: String,
    pub updated_at_field: String,
    /// Take the ticker from the document id instead of a field.
    pub ticker_from_document_id: bool,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            ticker_field: DEFAULT_TICKER_FIELD.to_string(),
            instrument_id_field: DEFAULT_INSTRUMENT_ID_FIELD.to_string(),
            price_field: DEFAULT_PRICE_FIELD.to_string(),
            updated_at_field: DEFAULT_UPDATED_AT_FIELD.to_string(),
            ticker_from_document_id: false,
        }
    }
}

impl RecordSchema {
    /// Builds a record from a document id and its plain JSON fields.
    pub fn read_record(&self, id: &str, fields: &Map<String, Value>) -> PortfolioRecord {
        let ticker = if self.ticker_from_document_id {
            Ticker::parse(id)
        } else {
            fields
                .get(&self.ticker_field)
                .and_then(Value::as_str)
                .and_then(Ticker::parse)
        };

        PortfolioRecord {
            id: id.to_string(),
            ticker,
            instrument_id: fields.get(&self.instrument_id_field).and_then(read_instrument_id),
            price: fields.get(&self.price_field).and_then(read_price),
            last_updated: fields.get(&self.updated_at_field).and_then(read_timestamp),
        }
    }

    /// The stored form of an instrument id: numeric ids stay numbers.
    pub fn instrument_id_value(&self, id: &InstrumentId) -> Value {
        match id.as_i64() {
            Some(n) => Value::from(n),
            None => Value::from(id.as_str()),
        }
    }
}

fn read_instrument_id(value: &Value) -> Option<InstrumentId> {
    match value {
        Value::Number(n) => {
            let n = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?;
            (n != 0).then(|| InstrumentId::from(n))
        }
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s != "0").then(|| InstrumentId::new(s))
        }
        _ => None,
    }
}

fn read_price(value: &Value) -> Option<Decimal> {
    let Value::Number(n) = value else {
        return None;
    };
    match n.as_i64() {
        Some(i) => Some(Decimal::from(i)),
        None => n.as_f64().and_then(Decimal::from_f64),
    }
}

fn read_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
