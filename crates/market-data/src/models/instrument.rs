use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::ProviderId;

/// Human-readable symbol of a tradable instrument (e.g. "AAPL").
///
/// Always trimmed and upper-cased; an empty ticker cannot be constructed.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(Arc<str>);

impl Ticker {
    /// Normalizes `raw` into a ticker. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(Arc::from(normalized)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a provider symbol.
    pub fn matches(&self, symbol: &str) -> bool {
        symbol.trim().eq_ignore_ascii_case(&self.0)
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value).ok_or_else(|| "ticker must not be empty".to_string())
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0.to_string()
    }
}

/// Opaque, provider-specific instrument identifier.
///
/// eToro ids are numeric; they are carried in their decimal string form so the
/// same type also fits symbol-keyed providers.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(Arc<str>);

impl InstrumentId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref().trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric form, for providers that key instruments by integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<i64> for InstrumentId {
    fn from(value: i64) -> Self {
        Self(Arc::from(value.to_string()))
    }
}

impl From<&Ticker> for InstrumentId {
    fn from(value: &Ticker) -> Self {
        Self(Arc::from(value.as_str()))
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ticker -> instrument id relationship, scoped to one provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMapping {
    pub provider: ProviderId,
    pub ticker: Ticker,
    pub instrument_id: InstrumentId,
}

impl InstrumentMapping {
    pub fn new(
        provider: impl Into<ProviderId>,
        ticker: Ticker,
        instrument_id: InstrumentId,
    ) -> Self {
        Self {
            provider: provider.into(),
            ticker,
            instrument_id,
        }
    }
}
