//! eToro market data providers.
//!
//! Two flavours of the same broker are supported:
//! - [`EtoroProvider`]: the public API, authenticated with an api key / user key
//!   pair. Tickers resolve through per-symbol search; rates are bid/ask.
//! - [`EtoroLiveProvider`]: the live rates API, authenticated with an OAuth
//!   bearer token. Tickers resolve against the full instrument catalog.
//!
//! Both price instruments at the bid/ask midpoint.

mod auth;
mod live;
pub(crate) mod models;

pub use auth::{OAuthRefresh, TokenManager, TokenSource};
pub use live::EtoroLiveProvider;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, PriceKind, Quote, SearchResult, ETORO};
use crate::provider::http::{join_ids, read_body, read_json};
use crate::provider::{
    MarketDataProvider, ProviderCapabilities, RateLimit, ResolutionStrategy, Watchlist,
    WatchlistApi,
};
use crate::registry::QuoteValidator;

use models::{
    AddItemsRequest, RatesResponse, SearchResponse, WatchlistPayload, WatchlistsResponse,
};

pub const DEFAULT_API_URL: &str = "https://public-api.etoro.com/api/v1";

/// Ids per rates request.
const MAX_BATCH_SIZE: usize = 50;

/// eToro public API provider.
pub struct EtoroProvider {
    client: Client,
    base_url: String,
    api_key: String,
    user_key: String,
}

impl EtoroProvider {
    pub fn new(api_key: String, user_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: DEFAULT_API_URL.to_string(),
            api_key,
            user_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Attaches the key pair and a fresh request id.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("x-user-key", &self.user_key)
            .header("x-request-id", Uuid::new_v4().to_string())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("eToro request: {} with {} params", endpoint, params.len());

        let response = self
            .authorized(self.client.get(&url).query(params))
            .send()
            .await
            .map_err(|e| MarketDataError::from_reqwest(ETORO, e))?;

        read_json(ETORO, response).await
    }
}

#[async_trait]
impl MarketDataProvider for EtoroProvider {
    fn id(&self) -> &'static str {
        ETORO
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resolution: ResolutionStrategy::Search,
            max_batch_size: MAX_BATCH_SIZE,
            price_kind: PriceKind::Midpoint,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 120,
            max_concurrency: 2,
            min_delay: Duration::from_millis(400),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let symbol = query.trim().to_uppercase();
        let response: SearchResponse = self
            .get_json("/market-data/search", &[("internalSymbolFull", symbol.as_str())])
            .await
            .map_err(|e| search_miss(e, &symbol))?;

        let results = response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.instrument_id?;
                let symbol = item.internal_symbol_full?;
                let result = SearchResult::new(symbol, id.into());
                Some(match item.instrument_display_name {
                    Some(name) => result.with_name(name),
                    None => result,
                })
            })
            .collect::<Vec<_>>();

        debug!("eToro search '{}' returned {} candidates", symbol, results.len());
        Ok(results)
    }

    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> Result<HashMap<InstrumentId, Quote>, MarketDataError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let joined = join_ids(ids);
        let response: RatesResponse = self
            .get_json("/market-data/instruments/rates", &[("instrumentIds", joined.as_str())])
            .await?;

        let mut quotes = HashMap::with_capacity(response.rates.len());
        for rate in response.rates {
            let Some(id) = rate.instrument_id.map(InstrumentId::from) else {
                continue;
            };
            let (Some(bid), Some(ask)) = (rate.bid, rate.ask) else {
                debug!("eToro rate for {} is missing bid or ask", id);
                continue;
            };
            if let Err(e) = QuoteValidator::check_spread(ETORO, bid, ask) {
                warn!("Skipping eToro rate for {}: {}", id, e);
                continue;
            }
            match Quote::midpoint(id.clone(), bid, ask, ETORO) {
                Some(quote) => {
                    quotes.insert(id, quote);
                }
                None => warn!("eToro rate for {} has a non-positive side, skipping", id),
            }
        }

        Ok(quotes)
    }
}

/// The search endpoint answers 404 for symbols it has never heard of.
fn search_miss(error: MarketDataError, symbol: &str) -> MarketDataError {
    match error {
        MarketDataError::Provider {
            http_status: Some(404),
            ..
        } => MarketDataError::NotFound {
            provider: ETORO.to_string(),
            ticker: symbol.to_string(),
        },
        other => other,
    }
}

fn watchlist_from_payload(payload: WatchlistPayload) -> Watchlist {
    Watchlist {
        id: InstrumentId::from(payload.id).to_string(),
        name: payload.name,
        instrument_ids: payload
            .items
            .into_iter()
            .filter_map(|item| item.instrument_id.map(InstrumentId::from))
            .collect(),
    }
}

#[async_trait]
impl WatchlistApi for EtoroProvider {
    async fn list_watchlists(&self) -> Result<Vec<Watchlist>, MarketDataError> {
        let response: WatchlistsResponse = self.get_json("/watchlists", &[]).await?;
        Ok(response
            .into_vec()
            .into_iter()
            .map(watchlist_from_payload)
            .collect())
    }

    async fn create_watchlist(&self, name: &str) -> Result<Watchlist, MarketDataError> {
        let url = format!("{}/watchlists", self.base_url);
        let response = self
            .authorized(self.client.post(&url).query(&[("name", name)]))
            .send()
            .await
            .map_err(|e| MarketDataError::from_reqwest(ETORO, e))?;

        let payload: WatchlistPayload = read_json(ETORO, response).await?;
        Ok(watchlist_from_payload(payload))
    }

    async fn add_to_watchlist(
        &self,
        watchlist_id: &str,
        ids: &[InstrumentId],
    ) -> Result<(), MarketDataError> {
        let numeric = ids.iter().filter_map(InstrumentId::as_i64).collect::<Vec<_>>();
        if numeric.is_empty() {
            return Ok(());
        }

        let url = format!("{}/watchlists/{}/items", self.base_url, watchlist_id);
        let response = self
            .authorized(self.client.post(&url).json(&AddItemsRequest(numeric)))
            .send()
            .await
            .map_err(|e| MarketDataError::from_reqwest(ETORO, e))?;

        read_body(ETORO, response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let provider = EtoroProvider::new("key".into(), "user".into());
        let caps = provider.capabilities();
        assert_eq!(caps.resolution, ResolutionStrategy::Search);
        assert_eq!(caps.max_batch_size, 50);
        assert_eq!(caps.price_kind, PriceKind::Midpoint);
        assert_eq!(provider.rate_limit().min_delay, Duration::from_millis(400));
    }

    #[test]
    fn test_base_url_override_drops_trailing_slash() {
        let provider =
            EtoroProvider::new("key".into(), "user".into()).with_base_url("http://localhost:9000/");
        assert_eq!(provider.base_url, "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let provider =
            EtoroProvider::new("key".into(), "user".into()).with_base_url("http://127.0.0.1:1");
        let quotes = provider.fetch_quotes(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_not_supported() {
        let provider = EtoroProvider::new("key".into(), "user".into());
        let err = provider.fetch_instrument_catalog().await.unwrap_err();
        assert!(matches!(err, MarketDataError::NotSupported { .. }));
    }

    #[test]
    fn test_search_404_is_not_found() {
        let err = search_miss(
            MarketDataError::Provider {
                provider: ETORO.to_string(),
                http_status: Some(404),
                message: String::new(),
            },
            "ZZZZ",
        );
        assert!(matches!(err, MarketDataError::NotFound { ref ticker, .. } if ticker == "ZZZZ"));

        let err = search_miss(
            MarketDataError::Provider {
                provider: ETORO.to_string(),
                http_status: Some(500),
                message: String::new(),
            },
            "AAPL",
        );
        assert!(matches!(
            err,
            MarketDataError::Provider {
                http_status: Some(500),
                ..
            }
        ));
    }
}
