//! One synchronization pass over the portfolio.
//!
//! ```text
//! load records -> resolve missing ids (persisted immediately)
//!              -> quote every ticker (primary, then fallback)
//!              -> write price + timestamp per record
//! ```
//!
//! Every write is independent. A failure or a timeout part way through keeps
//! whatever was already written; the next run converges on the rest.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use folio_market_data::{
    FallbackCoordinator, InstrumentId, InstrumentResolver, MarketDataError, Quote, QuoteTarget,
    Resolution, Ticker,
};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio::time::{timeout_at, Instant};

use super::summary::SyncSummary;
use crate::errors::Result;
use crate::portfolio::{PortfolioRecord, PortfolioStore};
use crate::watchlist::WatchlistSync;

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Knobs for one pass.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Concurrent resolutions and record writes.
    pub concurrency: usize,
    /// Budget for the whole pass.
    pub timeout: Duration,
    /// Resolve and persist instrument ids, skip quoting.
    pub resolve_only: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            resolve_only: false,
        }
    }
}

/// Records sharing one ticker.
#[derive(Debug, Default)]
struct TickerGroup {
    /// Primary-provider id, from a record or from resolution.
    instrument_id: Option<InstrumentId>,
    record_ids: Vec<String>,
    /// Records of the group still lacking an id.
    unresolved: Vec<String>,
}

struct ResolveOutcome {
    ticker: Ticker,
    result: std::result::Result<Resolution, MarketDataError>,
    written: usize,
    failed_writes: usize,
}

/// Drives resolution, quoting and write-back for the whole portfolio.
pub struct Reconciler {
    store: Arc<dyn PortfolioStore>,
    resolver: Arc<InstrumentResolver>,
    coordinator: Arc<FallbackCoordinator>,
    watchlist: Option<WatchlistSync>,
    options: SyncOptions,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        resolver: Arc<InstrumentResolver>,
        coordinator: Arc<FallbackCoordinator>,
    ) -> Self {
        Self {
            store,
            resolver,
            coordinator,
            watchlist: None,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_watchlist(mut self, watchlist: WatchlistSync) -> Self {
        self.watchlist = Some(watchlist);
        self
    }

    /// Runs one pass.
    ///
    /// Returns `Err` only when the records cannot be loaded or a provider
    /// rejects its credentials. Everything else is counted in the summary.
    pub async fn run(&self) -> Result<SyncSummary> {
        let deadline = Instant::now() + self.options.timeout;
        let mut summary = SyncSummary::default();

        let records = match timeout_at(deadline, self.store.load_records()).await {
            Ok(records) => records?,
            Err(_) => {
                warn!("Timed out loading portfolio records");
                summary.timed_out = true;
                return Ok(summary);
            }
        };
        summary.records = records.len();
        info!("Loaded {} portfolio records", records.len());

        let mut groups = group_by_ticker(records, &mut summary);

        let primary_not_found = self.resolve_missing(&mut groups, &mut summary, deadline).await?;

        if !summary.timed_out && !self.options.resolve_only {
            self.quote_and_write(&groups, &primary_not_found, &mut summary, deadline)
                .await?;
        } else {
            for ticker in primary_not_found {
                summary.add_not_found(ticker);
            }
            if !self.options.resolve_only {
                summary.unpriced = groups.values().map(|g| g.record_ids.len()).sum();
            }
        }

        if !summary.timed_out {
            if let Some(watchlist) = &self.watchlist {
                let ids: Vec<InstrumentId> = groups
                    .values()
                    .filter_map(|g| g.instrument_id.clone())
                    .collect();
                watchlist.sync(&ids).await;
            }
        }

        Ok(summary)
    }

    /// Resolves every ticker with at least one record lacking an id and
    /// stores the id on those records as soon as it is known.
    async fn resolve_missing(
        &self,
        groups: &mut BTreeMap<Ticker, TickerGroup>,
        summary: &mut SyncSummary,
        deadline: Instant,
    ) -> Result<HashSet<Ticker>> {
        let pending: Vec<(Ticker, Option<InstrumentId>, Vec<String>)> = groups
            .iter()
            .filter(|(_, group)| !group.unresolved.is_empty())
            .map(|(ticker, group)| {
                (
                    ticker.clone(),
                    group.instrument_id.clone(),
                    group.unresolved.clone(),
                )
            })
            .collect();

        let mut not_found = HashSet::new();
        if pending.is_empty() {
            return Ok(not_found);
        }
        debug!("{} tickers need an instrument id", pending.len());

        let mut outcomes = stream::iter(pending)
            .map(|(ticker, known, record_ids)| self.resolve_ticker(ticker, known, record_ids))
            .buffer_unordered(self.options.concurrency.max(1));

        loop {
            let outcome = match timeout_at(deadline, outcomes.next()).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => break,
                Err(_) => {
                    warn!("Timed out resolving instrument ids");
                    summary.timed_out = true;
                    break;
                }
            };

            summary.newly_resolved += outcome.written;
            summary.persistence_failures += outcome.failed_writes;

            match outcome.result {
                Ok(resolution) => match resolution.into_instrument_id() {
                    Some(id) => {
                        if let Some(group) = groups.get_mut(&outcome.ticker) {
                            group.instrument_id = Some(id);
                        }
                    }
                    None => {
                        not_found.insert(outcome.ticker);
                    }
                },
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("{}: resolution failed: {}", outcome.ticker, e);
                    summary.resolution_errors += 1;
                }
            }
        }

        Ok(not_found)
    }

    async fn resolve_ticker(
        &self,
        ticker: Ticker,
        known: Option<InstrumentId>,
        record_ids: Vec<String>,
    ) -> ResolveOutcome {
        let result = match known {
            // Another record already carries the id
            Some(id) => Ok(Resolution::Cached(id)),
            None => {
                info!("{}: resolving", ticker);
                self.resolver
                    .resolve(&ticker, self.coordinator.primary().as_ref())
                    .await
            }
        };

        let mut written = 0;
        let mut failed_writes = 0;
        if let Some(id) = result.as_ref().ok().and_then(Resolution::instrument_id) {
            for record_id in &record_ids {
                match self.store.set_instrument_id(record_id, id).await {
                    Ok(()) => {
                        debug!("{}: stored instrument id {} on {}", ticker, id, record_id);
                        written += 1;
                    }
                    Err(e) => {
                        warn!(
                            "{}: failed to store instrument id on {}: {}",
                            ticker, record_id, e
                        );
                        failed_writes += 1;
                    }
                }
            }
        }

        ResolveOutcome {
            ticker,
            result,
            written,
            failed_writes,
        }
    }

    async fn quote_and_write(
        &self,
        groups: &BTreeMap<Ticker, TickerGroup>,
        primary_not_found: &HashSet<Ticker>,
        summary: &mut SyncSummary,
        deadline: Instant,
    ) -> Result<()> {
        // Tickers the primary could not resolve still get a fallback attempt
        let targets: Vec<QuoteTarget> = groups
            .iter()
            .map(|(ticker, group)| QuoteTarget::new(ticker.clone(), group.instrument_id.clone()))
            .collect();

        let outcome = match timeout_at(deadline, self.coordinator.quote_all(&targets)).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!("Timed out fetching quotes");
                summary.timed_out = true;
                summary.unpriced = groups.values().map(|g| g.record_ids.len()).sum();
                return Ok(());
            }
        };

        let primary = self.coordinator.primary().id();
        let mut writes: Vec<(&Ticker, &str, &Quote)> = Vec::new();
        for (ticker, group) in groups {
            match outcome.prices.get(ticker) {
                Some(quote) => {
                    if quote.provider != primary {
                        info!(
                            "{}: priced by {} ({:?} price)",
                            ticker, quote.provider, quote.kind
                        );
                    }
                    writes.extend(group.record_ids.iter().map(|id| (ticker, id.as_str(), quote)));
                }
                None => {
                    if primary_not_found.contains(ticker) {
                        summary.add_not_found(ticker.clone());
                    }
                    warn!("{}: no price from any provider, left untouched", ticker);
                    summary.unpriced += group.record_ids.len();
                }
            }
        }

        let mut results = stream::iter(writes)
            .map(|(ticker, record_id, quote)| async move {
                let written = self.store.update_price(record_id, quote.price).await;
                (ticker, record_id, quote, written)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        loop {
            let (ticker, record_id, quote, written) =
                match timeout_at(deadline, results.next()).await {
                    Ok(Some(result)) => result,
                    Ok(None) => break,
                    Err(_) => {
                        warn!("Timed out writing prices");
                        summary.timed_out = true;
                        break;
                    }
                };

            match written {
                Ok(at) => {
                    info!("{}: price updated to {} on {}", ticker, quote.price, record_id);
                    debug!("{}: stored at {}", record_id, at);
                    summary.record_price(&quote.provider);
                }
                Err(e) => {
                    warn!("{}: failed to write price on {}: {}", ticker, record_id, e);
                    summary.persistence_failures += 1;
                }
            }
        }

        Ok(())
    }
}

fn group_by_ticker(
    records: Vec<PortfolioRecord>,
    summary: &mut SyncSummary,
) -> BTreeMap<Ticker, TickerGroup> {
    let mut groups: BTreeMap<Ticker, TickerGroup> = BTreeMap::new();

    for record in records {
        let Some(ticker) = record.ticker else {
            warn!("Record {}: no ticker, skipped", record.id);
            summary.skipped_no_ticker += 1;
            continue;
        };

        let group = groups.entry(ticker).or_default();
        match record.instrument_id {
            Some(id) => {
                summary.already_resolved += 1;
                if group.instrument_id.is_none() {
                    group.instrument_id = Some(id);
                }
            }
            None => group.unresolved.push(record.id.clone()),
        }
        group.record_ids.push(record.id);
    }

    groups
}
