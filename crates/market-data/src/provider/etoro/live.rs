use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{CatalogEntry, InstrumentId, PriceKind, Quote, ETORO_LIVE};
use crate::provider::http::{join_ids, read_json};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit, ResolutionStrategy};
use crate::registry::QuoteValidator;

use super::auth::TokenManager;
use super::models::{InstrumentCatalogResponse, LiveRatesResponse};

pub const DEFAULT_LIVE_URL: &str = "https://api.etoro.com";

const CATALOG_ENDPOINT: &str = "/metadata/instruments";
const RATES_ENDPOINT: &str = "/Live";

/// Ids per live rates request.
const MAX_BATCH_SIZE: usize = 100;

/// eToro live rates provider (OAuth bearer auth, full-catalog resolution).
pub struct EtoroLiveProvider {
    client: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl EtoroLiveProvider {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: DEFAULT_LIVE_URL.to_string(),
            tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// GET with the current bearer token. A 401 invalidates the token and the
    /// request is replayed once with a freshly minted one.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut replayed = false;

        loop {
            let token = self.tokens.bearer().await?;
            debug!("eToro live request: {}", endpoint);

            let response = self
                .client
                .get(&url)
                .query(params)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| MarketDataError::from_reqwest(ETORO_LIVE, e))?;

            if response.status() == StatusCode::UNAUTHORIZED
                && !replayed
                && self.tokens.can_refresh()
            {
                warn!("eToro live rejected the access token, refreshing");
                self.tokens.invalidate().await;
                replayed = true;
                continue;
            }

            return read_json(ETORO_LIVE, response).await;
        }
    }
}

#[async_trait]
impl MarketDataProvider for EtoroLiveProvider {
    fn id(&self) -> &'static str {
        ETORO_LIVE
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resolution: ResolutionStrategy::Catalog,
            max_batch_size: MAX_BATCH_SIZE,
            price_kind: PriceKind::Midpoint,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60,
            max_concurrency: 4,
            min_delay: Duration::from_millis(100),
        }
    }

    async fn fetch_instrument_catalog(&self) -> Result<Vec<CatalogEntry>, MarketDataError> {
        let response: InstrumentCatalogResponse = self.get_json(CATALOG_ENDPOINT, &[]).await?;

        let catalog = response
            .instrument_display_datas
            .into_iter()
            .filter_map(|data| {
                let id = data.instrument_id?;
                let symbol = data.symbol_full?;
                Some(CatalogEntry::new(symbol, id.into()))
            })
            .collect::<Vec<_>>();

        info!("eToro live catalog loaded: {} instruments", catalog.len());
        Ok(catalog)
    }

    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> Result<HashMap<InstrumentId, Quote>, MarketDataError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let joined = join_ids(ids);
        let response: LiveRatesResponse = self
            .get_json(RATES_ENDPOINT, &[("InstrumentIDs", joined.as_str())])
            .await?;

        let mut quotes = HashMap::with_capacity(response.rates.len());
        for rate in response.rates {
            let Some(id) = rate.instrument_id.map(InstrumentId::from) else {
                continue;
            };
            let (Some(bid), Some(ask)) = (rate.bid, rate.ask) else {
                debug!("eToro live rate for {} is missing bid or ask", id);
                continue;
            };
            if let Err(e) = QuoteValidator::check_spread(ETORO_LIVE, bid, ask) {
                warn!("Skipping eToro live rate for {}: {}", id, e);
                continue;
            }
            match Quote::midpoint(id.clone(), bid, ask, ETORO_LIVE) {
                Some(quote) => {
                    quotes.insert(id, quote);
                }
                None => warn!("eToro live rate for {} has a non-positive side, skipping", id),
            }
        }

        Ok(quotes)
    }
}
