//! Retry decorator for providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::{MarketDataError, RetryClass};
use crate::models::{CatalogEntry, InstrumentId, Quote, SearchResult};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

/// Delay before the first retry; doubled on every further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Wraps a provider and retries calls that fail with [`RetryClass::WithBackoff`].
///
/// Every other error class is returned immediately.
pub struct RetryingProvider {
    inner: Arc<dyn MarketDataProvider>,
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn MarketDataProvider>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff: BASE_BACKOFF,
        }
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    async fn retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, MarketDataError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, MarketDataError>> + Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e)
                    if e.retry_class() == RetryClass::WithBackoff && attempt < self.max_retries =>
                {
                    let delay = self.base_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        self.inner.id(),
                        operation,
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for RetryingProvider {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    fn rate_limit(&self) -> RateLimit {
        self.inner.rate_limit()
    }

    async fn fetch_instrument_catalog(&self) -> Result<Vec<CatalogEntry>, MarketDataError> {
        self.retry("catalog", || self.inner.fetch_instrument_catalog())
            .await
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        self.retry("search", || self.inner.search(query)).await
    }

    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> Result<HashMap<InstrumentId, Quote>, MarketDataError> {
        self.retry("quotes", || self.inner.fetch_quotes(ids)).await
    }
}
