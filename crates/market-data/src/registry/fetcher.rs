//! Batched quote fetching.
//!
//! Splits an id list into provider-sized chunks, issues one rate-limited
//! request per chunk with bounded concurrency and merges the answers.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, ProviderId, Quote};
use crate::provider::MarketDataProvider;

use super::rate_limiter::RateLimiter;
use super::validator::QuoteValidator;

/// Default number of chunk requests in flight per provider.
const DEFAULT_CONCURRENCY: usize = 4;

/// Result of [`QuoteFetcher::fetch_batch`].
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Valid quotes keyed by the requested id.
    pub quotes: HashMap<InstrumentId, Quote>,
    /// Ids whose chunk request failed.
    pub failed_ids: Vec<InstrumentId>,
    /// Number of chunk requests that failed.
    pub failed_chunks: usize,
}

impl BatchOutcome {
    /// Requested ids that got neither a quote nor a failure (provider had no price).
    pub fn missing<'a>(
        &'a self,
        requested: &'a [InstrumentId],
    ) -> impl Iterator<Item = &'a InstrumentId> {
        requested
            .iter()
            .filter(move |id| !self.quotes.contains_key(*id) && !self.failed_ids.contains(*id))
    }
}

/// Splits `ids` into consecutive chunks of at most `cap` items (a cap of 0 is treated as 1).
pub fn partition<T: Clone>(ids: &[T], cap: usize) -> Vec<Vec<T>> {
    ids.chunks(cap.max(1)).map(<[T]>::to_vec).collect()
}

/// Order-preserving de-duplication.
fn dedupe(ids: &[InstrumentId]) -> Vec<InstrumentId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

/// Fetches quotes for arbitrary id lists, respecting each provider's batch cap
/// and rate limit.
pub struct QuoteFetcher {
    limiter: Arc<RateLimiter>,
    validator: QuoteValidator,
    concurrency: usize,
}

impl QuoteFetcher {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            validator: QuoteValidator::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Caps the number of chunk requests in flight. The provider's own
    /// `max_concurrency` still applies when lower.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetches quotes for `ids` from `provider`.
    ///
    /// A failing chunk is logged and its ids are reported in
    /// [`BatchOutcome::failed_ids`]; the other chunks still count. Only an
    /// `Auth` error aborts the whole batch.
    pub async fn fetch_batch(
        &self,
        provider: &dyn MarketDataProvider,
        ids: &[InstrumentId],
    ) -> Result<BatchOutcome, MarketDataError> {
        let ids = dedupe(ids);
        let mut outcome = BatchOutcome::default();
        if ids.is_empty() {
            return Ok(outcome);
        }

        let provider_id: ProviderId = Cow::Borrowed(provider.id());
        let rate_limit = provider.rate_limit();
        self.limiter.register(&provider_id, &rate_limit);

        let cap = provider.capabilities().max_batch_size;
        let chunks = partition(&ids, cap);
        let total_chunks = chunks.len();
        let concurrency = self.concurrency.min(rate_limit.max_concurrency).max(1);
        debug!(
            "{}: fetching {} ids in {} chunks (cap {}, concurrency {})",
            provider_id,
            ids.len(),
            total_chunks,
            cap,
            concurrency
        );

        let mut results = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| {
                let provider_id = &provider_id;
                async move {
                    self.limiter.acquire(provider_id).await;
                    let result = provider.fetch_quotes(&chunk).await;
                    (index, chunk, result)
                }
            })
            .buffer_unordered(concurrency);

        while let Some((index, chunk, result)) = results.next().await {
            match result {
                Ok(quotes) => {
                    let requested: HashSet<&InstrumentId> = chunk.iter().collect();
                    for (id, quote) in quotes {
                        if !requested.contains(&id) {
                            debug!("{}: dropping unrequested quote for {}", provider_id, id);
                            continue;
                        }
                        match self.validator.validate(&quote) {
                            Ok(()) => {
                                outcome.quotes.insert(id, quote);
                            }
                            Err(e) => warn!("{}: rejected quote: {}", provider_id, e),
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "{}: chunk {}/{} failed ({} ids): {}",
                        provider_id,
                        index + 1,
                        total_chunks,
                        chunk.len(),
                        e
                    );
                    outcome.failed_chunks += 1;
                    outcome.failed_ids.extend(chunk);
                }
            }
        }

        debug!(
            "{}: {} quotes, {} failed chunks",
            provider_id,
            outcome.quotes.len(),
            outcome.failed_chunks
        );
        Ok(outcome)
    }
}
