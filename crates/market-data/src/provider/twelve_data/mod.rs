//! Twelve Data market data provider implementation.
//!
//! Prices come from the `/price` endpoint, which accepts a comma-separated
//! symbol list. The ticker itself is the instrument id, so no resolution
//! call is ever made.
//!
//! Response shapes:
//! - one symbol: `{"price": "187.44"}`
//! - several symbols: `{"AAPL": {"price": "187.44"}, "MSFT": {...}}`
//! - errors: `{"code": 400, "message": "...", "status": "error"}`, either at the
//!   top level or per symbol. HTTP status is 200 in both cases.
//!
//! API documentation: https://twelvedata.com/docs#real-time-price

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, PriceKind, Quote, TWELVE_DATA};
use crate::provider::http::{join_ids, parse_json, read_body};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit, ResolutionStrategy};

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

/// Free tier allows 8 symbols per request.
const MAX_BATCH_SIZE: usize = 8;

/// Free tier budget. Every symbol in a batch costs one credit.
const CREDITS_PER_MINUTE: u32 = 8;

/// Per-symbol or top-level error object.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

impl ErrorPayload {
    fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

#[derive(Debug, Deserialize)]
struct PricePayload {
    price: Value,
}

/// Twelve Data provider.
pub struct TwelveDataProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TwelveDataProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Prices arrive as strings; tolerate plain numbers too.
fn parse_price(value: &Value) -> Option<Decimal> {
    let price = match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok()?,
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok()?,
        _ => return None,
    };
    (price > Decimal::ZERO).then_some(price)
}

/// Maps a top-level error object. 401/403 are credential failures; unknown
/// symbols (400/404) are an empty answer, not an error.
fn top_level_error(payload: &ErrorPayload) -> Option<MarketDataError> {
    let message = payload.message.clone().unwrap_or_default();
    match payload.code {
        Some(401) | Some(403) => Some(MarketDataError::Auth {
            provider: TWELVE_DATA.to_string(),
            message,
        }),
        Some(400) | Some(404) => None,
        code => Some(MarketDataError::Provider {
            provider: TWELVE_DATA.to_string(),
            http_status: code,
            message,
        }),
    }
}

fn quote_from(symbol: &InstrumentId, entry: &Value) -> Option<Quote> {
    if let Ok(err) = serde_json::from_value::<ErrorPayload>(entry.clone()) {
        if err.is_error() {
            debug!(
                "Twelve Data has no price for {}: {}",
                symbol,
                err.message.unwrap_or_default()
            );
            return None;
        }
    }
    let payload = serde_json::from_value::<PricePayload>(entry.clone()).ok()?;
    match parse_price(&payload.price) {
        Some(price) => Some(Quote::last(symbol.clone(), price, TWELVE_DATA)),
        None => {
            warn!("Twelve Data returned an unusable price for {}", symbol);
            None
        }
    }
}

/// Decodes a `/price` body for the requested symbols.
fn parse_prices(
    ids: &[InstrumentId],
    body: &Value,
) -> Result<HashMap<InstrumentId, Quote>, MarketDataError> {
    if let Ok(err) = serde_json::from_value::<ErrorPayload>(body.clone()) {
        if err.is_error() {
            return match top_level_error(&err) {
                Some(e) => Err(e),
                None => Ok(HashMap::new()),
            };
        }
    }

    let mut quotes = HashMap::new();
    if let [single] = ids {
        if let Some(quote) = quote_from(single, body) {
            quotes.insert(single.clone(), quote);
        }
        return Ok(quotes);
    }

    let Value::Object(map) = body else {
        return Err(MarketDataError::InvalidResponse {
            provider: TWELVE_DATA.to_string(),
            message: "expected an object keyed by symbol".to_string(),
        });
    };

    for id in ids {
        let entry = map
            .iter()
            .find(|(symbol, _)| symbol.eq_ignore_ascii_case(id.as_str()))
            .map(|(_, entry)| entry);
        if let Some(quote) = entry.and_then(|entry| quote_from(id, entry)) {
            quotes.insert(id.clone(), quote);
        }
    }
    Ok(quotes)
}

#[async_trait]
impl MarketDataProvider for TwelveDataProvider {
    fn id(&self) -> &'static str {
        TWELVE_DATA
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resolution: ResolutionStrategy::Symbol,
            max_batch_size: MAX_BATCH_SIZE,
            price_kind: PriceKind::Last,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: (CREDITS_PER_MINUTE / MAX_BATCH_SIZE as u32).max(1),
            max_concurrency: 1,
            min_delay: Duration::from_millis(250),
        }
    }

    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> Result<HashMap<InstrumentId, Quote>, MarketDataError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/price", self.base_url);
        let symbols = join_ids(ids);
        debug!("Twelve Data request: /price for {}", symbols);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbols.as_str()), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| MarketDataError::from_reqwest(TWELVE_DATA, e))?;

        let body = read_body(TWELVE_DATA, response).await?;
        let value: Value = parse_json(TWELVE_DATA, &body)?;
        parse_prices(ids, &value)
    }
}
