//! Primary-then-fallback quote coordination.
//!
//! Per ticker:
//!
//! ```text
//! Pending -> TriedPrimary -> Resolved(primary)
//!                         -> TriedFallback -> Resolved(fallback)
//!                                          -> Unresolved
//! ```
//!
//! Instrument ids are not portable across providers, so targets are keyed by
//! ticker and the fallback provider gets its own ids through the resolver.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, ProviderId, Quote, Ticker};
use crate::provider::MarketDataProvider;
use crate::resolver::{InstrumentResolver, Resolution};

use super::fetcher::QuoteFetcher;

/// One ticker to price, with its primary-provider id when known.
#[derive(Clone, Debug)]
pub struct QuoteTarget {
    pub ticker: Ticker,
    pub primary_id: Option<InstrumentId>,
}

impl QuoteTarget {
    pub fn new(ticker: Ticker, primary_id: Option<InstrumentId>) -> Self {
        Self { ticker, primary_id }
    }
}

/// Where a ticker stands within one coordination pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstrumentState {
    Pending,
    TriedPrimary,
    TriedFallback,
    /// Priced by the named provider; never queried again this pass.
    Resolved(ProviderId),
    /// Neither provider priced it.
    Unresolved,
}

/// Result of [`FallbackCoordinator::quote_all`].
#[derive(Debug, Default)]
pub struct CoordinatorOutcome {
    pub prices: HashMap<Ticker, Quote>,
    pub states: HashMap<Ticker, InstrumentState>,
    /// Tickers the fallback provider could not resolve.
    pub fallback_not_found: Vec<Ticker>,
}

impl CoordinatorOutcome {
    pub fn unresolved(&self) -> impl Iterator<Item = &Ticker> {
        self.states
            .iter()
            .filter(|(_, state)| **state == InstrumentState::Unresolved)
            .map(|(ticker, _)| ticker)
    }
}

/// Runs the primary provider first and the fallback only for what is left.
pub struct FallbackCoordinator {
    fetcher: Arc<QuoteFetcher>,
    resolver: Arc<InstrumentResolver>,
    primary: Arc<dyn MarketDataProvider>,
    fallback: Option<Arc<dyn MarketDataProvider>>,
    concurrency: usize,
}

impl FallbackCoordinator {
    pub fn new(
        fetcher: Arc<QuoteFetcher>,
        resolver: Arc<InstrumentResolver>,
        primary: Arc<dyn MarketDataProvider>,
        fallback: Option<Arc<dyn MarketDataProvider>>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            primary,
            fallback,
            concurrency: 4,
        }
    }

    /// Bounds concurrent fallback resolutions.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn primary(&self) -> &Arc<dyn MarketDataProvider> {
        &self.primary
    }

    /// Prices every target, primary first.
    ///
    /// Only `Auth` failures are returned as errors; everything else degrades
    /// to `Unresolved`.
    pub async fn quote_all(
        &self,
        targets: &[QuoteTarget],
    ) -> Result<CoordinatorOutcome, MarketDataError> {
        let targets = merge_targets(targets);
        let mut outcome = CoordinatorOutcome {
            states: targets
                .iter()
                .map(|t| (t.ticker.clone(), InstrumentState::Pending))
                .collect(),
            ..Default::default()
        };
        if targets.is_empty() {
            return Ok(outcome);
        }

        // Primary pass
        let primary_id: ProviderId = self.primary.id().into();
        let mut by_primary_id: HashMap<InstrumentId, Vec<Ticker>> = HashMap::new();
        for target in &targets {
            if let Some(id) = &target.primary_id {
                by_primary_id
                    .entry(id.clone())
                    .or_default()
                    .push(target.ticker.clone());
            }
        }
        let primary_ids: Vec<InstrumentId> = targets
            .iter()
            .filter_map(|t| t.primary_id.clone())
            .collect();

        let batch = self
            .fetcher
            .fetch_batch(self.primary.as_ref(), &primary_ids)
            .await?;
        for state in outcome.states.values_mut() {
            *state = InstrumentState::TriedPrimary;
        }
        apply_quotes(&mut outcome, batch.quotes, &by_primary_id, &primary_id);
        info!(
            "{}: priced {}/{} tickers",
            primary_id,
            outcome.prices.len(),
            targets.len()
        );

        // Fallback pass
        let remaining: Vec<Ticker> = targets
            .iter()
            .map(|t| &t.ticker)
            .filter(|ticker| !outcome.prices.contains_key(*ticker))
            .cloned()
            .collect();

        let Some(fallback) = &self.fallback else {
            mark_unresolved(&mut outcome, &remaining);
            return Ok(outcome);
        };
        if remaining.is_empty() {
            return Ok(outcome);
        }

        let fallback_id: ProviderId = fallback.id().into();
        debug!("{}: trying {} tickers", fallback_id, remaining.len());

        let by_fallback_id = self
            .resolve_fallback_ids(fallback.as_ref(), &remaining, &mut outcome)
            .await?;
        for ticker in &remaining {
            outcome
                .states
                .insert(ticker.clone(), InstrumentState::TriedFallback);
        }

        let fallback_ids: Vec<InstrumentId> = by_fallback_id.keys().cloned().collect();
        let batch = self
            .fetcher
            .fetch_batch(fallback.as_ref(), &fallback_ids)
            .await?;
        apply_quotes(&mut outcome, batch.quotes, &by_fallback_id, &fallback_id);
        mark_unresolved(&mut outcome, &remaining);

        info!(
            "{}: priced {}/{} remaining tickers",
            fallback_id,
            remaining
                .iter()
                .filter(|t| outcome.prices.contains_key(*t))
                .count(),
            remaining.len()
        );
        Ok(outcome)
    }

    async fn resolve_fallback_ids(
        &self,
        fallback: &dyn MarketDataProvider,
        tickers: &[Ticker],
        outcome: &mut CoordinatorOutcome,
    ) -> Result<HashMap<InstrumentId, Vec<Ticker>>, MarketDataError> {
        let resolutions: Vec<(Ticker, Result<Resolution, MarketDataError>)> =
            stream::iter(tickers.iter().cloned())
                .map(|ticker| async move {
                    let resolution = self.resolver.resolve(&ticker, fallback).await;
                    (ticker, resolution)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut by_id: HashMap<InstrumentId, Vec<Ticker>> = HashMap::new();
        for (ticker, resolution) in resolutions {
            match resolution {
                Ok(resolution) => match resolution.into_instrument_id() {
                    Some(id) => by_id.entry(id).or_default().push(ticker),
                    None => outcome.fallback_not_found.push(ticker),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{}: {} resolution failed: {}", ticker, fallback.id(), e),
            }
        }
        outcome.fallback_not_found.sort();
        Ok(by_id)
    }
}

/// One target per ticker; a later target may supply a missing primary id.
fn merge_targets(targets: &[QuoteTarget]) -> Vec<QuoteTarget> {
    let mut merged: Vec<QuoteTarget> = Vec::with_capacity(targets.len());
    let mut index: HashMap<Ticker, usize> = HashMap::new();
    for target in targets {
        match index.get(&target.ticker) {
            Some(&i) => {
                if merged[i].primary_id.is_none() {
                    merged[i].primary_id = target.primary_id.clone();
                }
            }
            None => {
                index.insert(target.ticker.clone(), merged.len());
                merged.push(target.clone());
            }
        }
    }
    merged
}

fn apply_quotes(
    outcome: &mut CoordinatorOutcome,
    quotes: HashMap<InstrumentId, Quote>,
    tickers_by_id: &HashMap<InstrumentId, Vec<Ticker>>,
    provider: &ProviderId,
) {
    for (id, quote) in quotes {
        let Some(tickers) = tickers_by_id.get(&id) else {
            continue;
        };
        for ticker in tickers {
            if outcome.prices.contains_key(ticker) {
                continue;
            }
            debug!("{}: {} from {} ({:?})", ticker, quote.price, provider, quote.kind);
            outcome.prices.insert(ticker.clone(), quote.clone());
            outcome
                .states
                .insert(ticker.clone(), InstrumentState::Resolved(provider.clone()));
        }
    }
}

fn mark_unresolved(outcome: &mut CoordinatorOutcome, tickers: &[Ticker]) {
    for ticker in tickers {
        if !outcome.prices.contains_key(ticker) {
            outcome
                .states
                .insert(ticker.clone(), InstrumentState::Unresolved);
        }
    }
}
