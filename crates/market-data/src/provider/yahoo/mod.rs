//! Yahoo Finance market data provider.
//!
//! Last close of the current session via the chart API. The ticker is the
//! Yahoo symbol (e.g. `AAPL`, `ENI.MI`); no resolution call is made.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, PriceKind, Quote, YAHOO};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit, ResolutionStrategy};

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| MarketDataError::Provider {
            provider: YAHOO.to_string(),
            http_status: None,
            message: format!("Failed to initialize Yahoo connector: {}", e),
        })?;
        Ok(Self { connector })
    }

    /// Latest quote for one symbol. `Ok(None)` when Yahoo has no data for it.
    async fn fetch_latest(&self, id: &InstrumentId) -> Result<Option<Quote>, MarketDataError> {
        let symbol = id.as_str();
        let response = match self.connector.get_latest_quotes(symbol, "1d").await {
            Ok(response) => response,
            Err(yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) => {
                debug!("Yahoo has no quotes for {}", symbol);
                return Ok(None);
            }
            Err(e) => {
                return Err(MarketDataError::Provider {
                    provider: YAHOO.to_string(),
                    http_status: None,
                    message: e.to_string(),
                })
            }
        };

        let yahoo_quote = match response.last_quote() {
            Ok(quote) => quote,
            Err(e) => {
                warn!("No quotes returned for {}: {}", symbol, e);
                return Ok(None);
            }
        };

        Ok(to_quote(id, yahoo_quote.close, yahoo_quote.timestamp as i64))
    }
}

/// Builds a quote from a raw close and unix timestamp. Non-finite or
/// non-positive closes yield `None`.
fn to_quote(id: &InstrumentId, close: f64, timestamp: i64) -> Option<Quote> {
    let price = Decimal::from_f64(close)?;
    if price <= Decimal::ZERO {
        return None;
    }
    let timestamp: DateTime<Utc> = Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or_else(Utc::now);
    Some(Quote::last(id.clone(), price.normalize(), YAHOO).with_timestamp(timestamp))
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        YAHOO
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resolution: ResolutionStrategy::Symbol,
            max_batch_size: 1,
            price_kind: PriceKind::Last,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 2000,
            max_concurrency: 10,
            min_delay: Duration::from_millis(50),
        }
    }

    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> Result<HashMap<InstrumentId, Quote>, MarketDataError> {
        let mut quotes = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(quote) = self.fetch_latest(id).await? {
                quotes.insert(id.clone(), quote);
            }
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_capabilities() {
        let provider = YahooProvider::new().unwrap();
        let caps = provider.capabilities();
        assert_eq!(caps.resolution, ResolutionStrategy::Symbol);
        assert_eq!(caps.max_batch_size, 1);
        assert_eq!(caps.price_kind, PriceKind::Last);
    }

    #[test]
    fn test_rate_limit() {
        let provider = YahooProvider::new().unwrap();
        let limit = provider.rate_limit();
        assert_eq!(limit.requests_per_minute, 2000);
        assert_eq!(limit.max_concurrency, 10);
    }

    #[test]
    fn test_to_quote() {
        let id = InstrumentId::new("ENI.MI");
        let quote = to_quote(&id, 14.25, 1_700_000_000).unwrap();
        assert_eq!(quote.price, dec!(14.25));
        assert_eq!(quote.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(quote.provider, YAHOO);
    }

    #[test]
    fn test_to_quote_rejects_bad_prices() {
        let id = InstrumentId::new("X");
        assert!(to_quote(&id, 0.0, 0).is_none());
        assert!(to_quote(&id, f64::NAN, 0).is_none());
        assert!(to_quote(&id, -3.0, 0).is_none());
    }
}
