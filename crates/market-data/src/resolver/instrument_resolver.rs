use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::OnceCell;

use crate::errors::MarketDataError;
use crate::models::{CatalogEntry, InstrumentId, InstrumentMapping, ProviderId, Ticker};
use crate::provider::{MarketDataProvider, ResolutionStrategy};
use crate::registry::RateLimiter;

use super::traits::{MappingStore, Resolution};

/// Upper-cased symbol -> instrument id.
type CatalogIndex = HashMap<String, InstrumentId>;

/// Outcome of the single catalog download; a failure is kept for the rest of
/// the resolver's lifetime.
type CatalogSlot = Arc<OnceCell<Result<CatalogIndex, MarketDataError>>>;

/// Maps tickers to provider instrument ids, persisting every successful
/// resolution so it is never repeated.
///
/// Catalog providers are fetched at most once per resolver, successful or
/// not; search providers get one rate-limited call per unresolved ticker.
pub struct InstrumentResolver {
    store: Arc<dyn MappingStore>,
    limiter: Arc<RateLimiter>,
    catalogs: Mutex<HashMap<&'static str, CatalogSlot>>,
}

impl InstrumentResolver {
    pub fn new(store: Arc<dyn MappingStore>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            store,
            limiter,
            catalogs: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `ticker` against `provider`.
    ///
    /// Errors are provider/transport failures only; "no match" is
    /// [`Resolution::NotFound`].
    pub async fn resolve(
        &self,
        ticker: &Ticker,
        provider: &dyn MarketDataProvider,
    ) -> Result<Resolution, MarketDataError> {
        let provider_id = provider.id();

        match self.store.get(provider_id, ticker).await {
            Ok(Some(id)) => {
                debug!("{}: cached {} id {}", ticker, provider_id, id);
                return Ok(Resolution::Cached(id));
            }
            Ok(None) => {}
            Err(e) => warn!("{}: mapping lookup failed, resolving anew: {}", ticker, e),
        }

        let found = match provider.capabilities().resolution {
            ResolutionStrategy::Symbol => Some(InstrumentId::from(ticker)),
            ResolutionStrategy::Catalog => self.lookup_catalog(ticker, provider).await?,
            ResolutionStrategy::Search => self.search_exact(ticker, provider).await?,
        };

        let Some(id) = found else {
            info!("{}: not found at {}", ticker, provider_id);
            return Ok(Resolution::NotFound);
        };

        let mapping = InstrumentMapping::new(provider_id, ticker.clone(), id.clone());
        let id = match self.store.put(&mapping).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("{}: failed to persist {} mapping: {}", ticker, provider_id, e);
                id
            }
        };

        info!("{}: resolved at {} -> {}", ticker, provider_id, id);
        Ok(Resolution::Resolved(id))
    }

    async fn lookup_catalog(
        &self,
        ticker: &Ticker,
        provider: &dyn MarketDataProvider,
    ) -> Result<Option<InstrumentId>, MarketDataError> {
        let cell = {
            let mut catalogs = self.catalogs.lock().map_err(|_| {
                MarketDataError::Storage("catalog cache lock poisoned".to_string())
            })?;
            catalogs
                .entry(provider.id())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let index = cell
            .get_or_init(|| async {
                let provider_id: ProviderId = Cow::Borrowed(provider.id());
                self.limiter.register(&provider_id, &provider.rate_limit());
                self.limiter.acquire(&provider_id).await;
                match provider.fetch_instrument_catalog().await {
                    Ok(catalog) => Ok(index_catalog(catalog)),
                    Err(e) => {
                        warn!("{} catalog unavailable for this run: {}", provider_id, e);
                        Err(e)
                    }
                }
            })
            .await;

        match index {
            Ok(index) => Ok(index.get(ticker.as_str()).cloned()),
            Err(e) => Err(e.clone()),
        }
    }

    async fn search_exact(
        &self,
        ticker: &Ticker,
        provider: &dyn MarketDataProvider,
    ) -> Result<Option<InstrumentId>, MarketDataError> {
        let provider_id: ProviderId = Cow::Borrowed(provider.id());
        self.limiter.register(&provider_id, &provider.rate_limit());
        self.limiter.acquire(&provider_id).await;

        debug!("{}: searching {}", ticker, provider_id);
        let candidates = match provider.search(ticker.as_str()).await {
            Ok(candidates) => candidates,
            Err(MarketDataError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(candidates
            .into_iter()
            .find(|candidate| candidate.is_exact_match(ticker))
            .map(|candidate| candidate.instrument_id))
    }
}

/// First occurrence wins when a catalog lists a symbol twice.
fn index_catalog(catalog: Vec<CatalogEntry>) -> CatalogIndex {
    let mut index = HashMap::with_capacity(catalog.len());
    for entry in catalog {
        index
            .entry(entry.symbol.trim().to_uppercase())
            .or_insert(entry.instrument_id);
    }
    index
}
