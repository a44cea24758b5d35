//! Integration tests for the synchronization pass.
//!
//! Stores and providers are in-memory mocks; the market data stack
//! (resolver, fetcher, coordinator, rate limiter) is the real one.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::errors::{DatabaseError, Result};
use folio_core::{PortfolioRecord, PortfolioStore, Reconciler, SyncOptions, WatchlistSync};
use folio_market_data::{
    CatalogEntry, FallbackCoordinator, InstrumentId, InstrumentResolver, MappingStore,
    MarketDataError, MarketDataProvider, MemoryMappingStore, PriceKind, ProviderCapabilities,
    Quote, QuoteFetcher, RateLimit, RateLimiter, ResolutionStrategy, SearchResult, Ticker,
    Watchlist, WatchlistApi,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// =============================================================================
// Mocks
// =============================================================================

#[derive(Default)]
struct MemoryPortfolio {
    records: Mutex<Vec<PortfolioRecord>>,
    /// Record ids whose writes are rejected.
    reject_writes: HashSet<String>,
}

impl MemoryPortfolio {
    fn with(records: Vec<PortfolioRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    fn get(&self, id: &str) -> PortfolioRecord {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap()
    }

    fn check_write(&self, id: &str) -> Result<()> {
        if self.reject_writes.contains(id) {
            return Err(DatabaseError::QueryFailed(format!("write to {} rejected", id)).into());
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioStore for MemoryPortfolio {
    async fn load_records(&self) -> Result<Vec<PortfolioRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn set_instrument_id(&self, record_id: &str, instrument_id: &InstrumentId) -> Result<()> {
        self.check_write(record_id)?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| DatabaseError::NotFound(record_id.to_string()))?;
        record.instrument_id = Some(instrument_id.clone());
        Ok(())
    }

    async fn update_price(&self, record_id: &str, price: Decimal) -> Result<DateTime<Utc>> {
        self.check_write(record_id)?;
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| DatabaseError::NotFound(record_id.to_string()))?;
        record.price = Some(price);
        record.last_updated = Some(now);
        Ok(now)
    }
}

struct MockProvider {
    id: &'static str,
    strategy: ResolutionStrategy,
    batch_size: usize,
    catalog: Vec<CatalogEntry>,
    prices: HashMap<InstrumentId, Decimal>,
    /// Any chunk containing this id fails with a network error.
    failing_id: Option<InstrumentId>,
    auth_failure: bool,
    quote_delay: Option<Duration>,
    requested: Mutex<Vec<InstrumentId>>,
    catalog_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl MockProvider {
    fn new(id: &'static str) -> Self {
        Self {
            id,
            strategy: ResolutionStrategy::Catalog,
            batch_size: 50,
            catalog: Vec::new(),
            prices: HashMap::new(),
            failing_id: None,
            auth_failure: false,
            quote_delay: None,
            requested: Mutex::new(Vec::new()),
            catalog_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    fn strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    fn list(mut self, symbol: &str, id: i64) -> Self {
        self.catalog.push(CatalogEntry::new(symbol, InstrumentId::from(id)));
        self
    }

    fn price(mut self, id: i64, price: Decimal) -> Self {
        self.prices.insert(InstrumentId::from(id), price);
        self
    }

    fn requested(&self) -> Vec<InstrumentId> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resolution: self.strategy,
            max_batch_size: self.batch_size,
            price_kind: PriceKind::Midpoint,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 6000,
            max_concurrency: 4,
            min_delay: Duration::ZERO,
        }
    }

    async fn fetch_instrument_catalog(
        &self,
    ) -> std::result::Result<Vec<CatalogEntry>, MarketDataError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalog.clone())
    }

    async fn search(&self, query: &str) -> std::result::Result<Vec<SearchResult>, MarketDataError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .catalog
            .iter()
            .filter(|entry| entry.symbol.starts_with(query))
            .map(|entry| SearchResult::new(entry.symbol.clone(), entry.instrument_id.clone()))
            .collect())
    }

    async fn fetch_quotes(
        &self,
        ids: &[InstrumentId],
    ) -> std::result::Result<HashMap<InstrumentId, Quote>, MarketDataError> {
        self.requested.lock().unwrap().extend(ids.iter().cloned());

        if let Some(delay) = self.quote_delay {
            tokio::time::sleep(delay).await;
        }
        if self.auth_failure {
            return Err(MarketDataError::Auth {
                provider: self.id.to_string(),
                message: "token expired".to_string(),
            });
        }
        if let Some(failing) = &self.failing_id {
            if ids.contains(failing) {
                return Err(MarketDataError::Provider {
                    provider: self.id.to_string(),
                    http_status: None,
                    message: "connection reset".to_string(),
                });
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| {
                self.prices
                    .get(id)
                    .map(|p| (id.clone(), Quote::last(id.clone(), *p, self.id)))
            })
            .collect())
    }
}

#[derive(Default)]
struct MockWatchlists {
    added: Mutex<Vec<InstrumentId>>,
}

#[async_trait]
impl WatchlistApi for MockWatchlists {
    async fn list_watchlists(&self) -> std::result::Result<Vec<Watchlist>, MarketDataError> {
        Ok(vec![Watchlist {
            id: "wl-1".to_string(),
            name: "Portafoglio".to_string(),
            instrument_ids: vec![InstrumentId::from(42)],
        }])
    }

    async fn create_watchlist(
        &self,
        _name: &str,
    ) -> std::result::Result<Watchlist, MarketDataError> {
        unreachable!("watchlist already exists")
    }

    async fn add_to_watchlist(
        &self,
        _watchlist_id: &str,
        ids: &[InstrumentId],
    ) -> std::result::Result<(), MarketDataError> {
        self.added.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    store: Arc<MemoryPortfolio>,
    mappings: Arc<MemoryMappingStore>,
    primary: Arc<MockProvider>,
    fallback: Option<Arc<MockProvider>>,
}

impl Harness {
    fn new(store: MemoryPortfolio, primary: MockProvider, fallback: Option<MockProvider>) -> Self {
        Self {
            store: Arc::new(store),
            mappings: Arc::new(MemoryMappingStore::new()),
            primary: Arc::new(primary),
            fallback: fallback.map(Arc::new),
        }
    }

    fn reconciler(&self, options: SyncOptions) -> Reconciler {
        let limiter = Arc::new(RateLimiter::new());
        let resolver = Arc::new(InstrumentResolver::new(
            self.mappings.clone(),
            limiter.clone(),
        ));
        let coordinator = FallbackCoordinator::new(
            Arc::new(QuoteFetcher::new(limiter)),
            resolver.clone(),
            self.primary.clone(),
            self.fallback
                .clone()
                .map(|f| f as Arc<dyn MarketDataProvider>),
        );
        Reconciler::new(self.store.clone(), resolver, Arc::new(coordinator)).with_options(options)
    }
}

fn ticker(s: &str) -> Ticker {
    Ticker::parse(s).unwrap()
}

fn record(id: &str, symbol: &str, instrument_id: Option<i64>) -> PortfolioRecord {
    let record = PortfolioRecord::new(id, Ticker::parse(symbol));
    match instrument_id {
        Some(n) => record.with_instrument_id(InstrumentId::from(n)),
        None => record,
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_end_to_end_primary_and_fallback() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("a", "AAA", None), record("b", "BBB", Some(42))]),
        MockProvider::new("PRIMARY").list("AAA", 7).price(42, dec!(100)),
        Some(MockProvider::new("FALLBACK").list("AAA", 7).price(7, dec!(55))),
    );

    let summary = harness.reconciler(SyncOptions::default()).run().await.unwrap();

    let aaa = harness.store.get("a");
    assert_eq!(aaa.ticker, Some(ticker("AAA")));
    assert_eq!(aaa.instrument_id, Some(InstrumentId::from(7)));
    assert_eq!(aaa.price, Some(dec!(55)));
    assert!(aaa.last_updated.is_some());

    let bbb = harness.store.get("b");
    assert_eq!(bbb.ticker, Some(ticker("BBB")));
    assert_eq!(bbb.instrument_id, Some(InstrumentId::from(42)));
    assert_eq!(bbb.price, Some(dec!(100)));
    assert!(bbb.last_updated.is_some());

    assert_eq!(harness.store.records.lock().unwrap().len(), 2);

    assert_eq!(summary.records, 2);
    assert_eq!(summary.already_resolved, 1);
    assert_eq!(summary.newly_resolved, 1);
    assert_eq!(summary.prices_updated, 2);
    assert_eq!(summary.by_provider["PRIMARY"], 1);
    assert_eq!(summary.by_provider["FALLBACK"], 1);
    assert!(summary.not_found.is_empty());
    assert!(!summary.timed_out);

    // BBB was priced by the primary and never reached the fallback
    let fallback = harness.fallback.as_ref().unwrap();
    assert_eq!(fallback.requested(), vec![InstrumentId::from(7)]);
}

#[tokio::test]
async fn test_unresolvable_ticker_reported_once() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("z1", "ZZZZ", None), record("z2", "zzzz", None)]),
        MockProvider::new("PRIMARY").list("AAA", 7),
        Some(MockProvider::new("FALLBACK").list("AAA", 7)),
    );

    let summary = harness.reconciler(SyncOptions::default()).run().await.unwrap();

    assert_eq!(summary.not_found, vec![ticker("ZZZZ")]);
    assert_eq!(summary.prices_updated, 0);
    assert_eq!(summary.unpriced, 2);

    for id in ["z1", "z2"] {
        let record = harness.store.get(id);
        assert_eq!(record.instrument_id, None);
        assert_eq!(record.price, None);
        assert_eq!(record.last_updated, None);
    }
}

#[tokio::test]
async fn test_failed_middle_chunk_keeps_the_rest() {
    let records = (1..=6)
        .map(|n| record(&format!("r{}", n), &format!("T{}", n), Some(n)))
        .collect();
    let mut primary = MockProvider::new("PRIMARY").batch_size(2);
    for n in 1..=6 {
        primary = primary.price(n, Decimal::from(n * 10));
    }
    // Chunks are [1, 2], [3, 4], [5, 6]
    primary.failing_id = Some(InstrumentId::from(3));

    let harness = Harness::new(MemoryPortfolio::with(records), primary, None);
    let summary = harness.reconciler(SyncOptions::default()).run().await.unwrap();

    assert_eq!(summary.prices_updated, 4);
    assert_eq!(summary.unpriced, 2);
    for n in [1, 2, 5, 6] {
        assert_eq!(harness.store.get(&format!("r{}", n)).price, Some(Decimal::from(n * 10)));
    }
    for n in [3, 4] {
        assert_eq!(harness.store.get(&format!("r{}", n)).price, None);
    }

    // Each id requested exactly once: the failed chunk is not retried
    let mut requested = harness.primary.requested();
    requested.sort();
    let mut expected: Vec<InstrumentId> = (1..=6).map(InstrumentId::from).collect();
    expected.sort();
    assert_eq!(requested, expected);
}

#[tokio::test]
async fn test_search_resolution_is_not_repeated() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("a", "AAPL", None)]),
        MockProvider::new("PRIMARY")
            .strategy(ResolutionStrategy::Search)
            .list("AAPL.L", 2)
            .list("AAPL", 1001)
            .price(1001, dec!(187.5)),
        None,
    );

    let first = harness.reconciler(SyncOptions::default()).run().await.unwrap();
    assert_eq!(first.newly_resolved, 1);
    assert_eq!(harness.store.get("a").instrument_id, Some(InstrumentId::from(1001)));

    let second = harness.reconciler(SyncOptions::default()).run().await.unwrap();
    assert_eq!(second.newly_resolved, 0);
    assert_eq!(second.already_resolved, 1);
    assert_eq!(second.prices_updated, 1);

    assert_eq!(harness.primary.search_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.mappings.get("PRIMARY", &ticker("AAPL")).await.unwrap(),
        Some(InstrumentId::from(1001))
    );
}

#[tokio::test]
async fn test_stored_mapping_survives_failed_record_write() {
    let mut store = MemoryPortfolio::with(vec![record("a", "AAA", None)]);
    store.reject_writes.insert("a".to_string());
    let harness = Harness::new(
        store,
        MockProvider::new("PRIMARY").list("AAA", 7).price(7, dec!(12)),
        None,
    );

    let first = harness.reconciler(SyncOptions::default()).run().await.unwrap();
    assert_eq!(first.newly_resolved, 0);
    // Failed id write and failed price write
    assert_eq!(first.persistence_failures, 2);
    assert_eq!(harness.store.get("a").instrument_id, None);

    // A fresh resolver starts from the persisted mapping, not the catalog
    harness.reconciler(SyncOptions::default()).run().await.unwrap();
    assert_eq!(harness.primary.catalog_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_records_sharing_a_ticker_resolve_once() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![
            record("a1", "AAA", None),
            record("a2", "aaa", None),
            record("a3", "AAA", Some(7)),
        ]),
        MockProvider::new("PRIMARY")
            .strategy(ResolutionStrategy::Search)
            .list("AAA", 7)
            .price(7, dec!(10.2)),
        None,
    );

    let summary = harness.reconciler(SyncOptions::default()).run().await.unwrap();

    // The id already on a3 is reused without a search
    assert_eq!(harness.primary.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.newly_resolved, 2);
    assert_eq!(summary.prices_updated, 3);
    for id in ["a1", "a2", "a3"] {
        assert_eq!(harness.store.get(id).price, Some(dec!(10.2)));
    }
    assert_eq!(harness.primary.requested(), vec![InstrumentId::from(7)]);
}

#[tokio::test]
async fn test_records_without_ticker_are_skipped() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![
            PortfolioRecord::new("blank", None),
            record("b", "BBB", Some(42)),
        ]),
        MockProvider::new("PRIMARY").price(42, dec!(100)),
        None,
    );

    let summary = harness.reconciler(SyncOptions::default()).run().await.unwrap();

    assert_eq!(summary.skipped_no_ticker, 1);
    assert_eq!(summary.prices_updated, 1);
    assert_eq!(harness.store.get("blank").price, None);
}

#[tokio::test]
async fn test_auth_failure_aborts_run() {
    let mut primary = MockProvider::new("PRIMARY").price(42, dec!(100));
    primary.auth_failure = true;
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("b", "BBB", Some(42))]),
        primary,
        None,
    );

    let err = harness.reconciler(SyncOptions::default()).run().await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(harness.store.get("b").price, None);
}

#[tokio::test]
async fn test_resolve_only_skips_quotes() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("a", "AAA", None), record("z", "ZZZZ", None)]),
        MockProvider::new("PRIMARY").list("AAA", 7).price(7, dec!(1)),
        None,
    );
    let options = SyncOptions {
        resolve_only: true,
        ..SyncOptions::default()
    };

    let summary = harness.reconciler(options).run().await.unwrap();

    assert_eq!(summary.newly_resolved, 1);
    assert_eq!(summary.not_found, vec![ticker("ZZZZ")]);
    assert_eq!(summary.prices_updated, 0);
    assert!(harness.primary.requested().is_empty());
    assert_eq!(harness.store.get("a").instrument_id, Some(InstrumentId::from(7)));
    assert_eq!(harness.store.get("a").price, None);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_resolved_ids() {
    let mut primary = MockProvider::new("PRIMARY").list("AAA", 7).price(7, dec!(1));
    primary.quote_delay = Some(Duration::from_secs(600));
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("a", "AAA", None)]),
        primary,
        None,
    );
    let options = SyncOptions {
        timeout: Duration::from_secs(5),
        ..SyncOptions::default()
    };

    let summary = harness.reconciler(options).run().await.unwrap();

    assert!(summary.timed_out);
    assert_eq!(summary.newly_resolved, 1);
    assert_eq!(summary.prices_updated, 0);
    assert_eq!(summary.unpriced, 1);
    assert_eq!(harness.store.get("a").instrument_id, Some(InstrumentId::from(7)));
}

#[tokio::test]
async fn test_watchlist_receives_resolved_ids() {
    let harness = Harness::new(
        MemoryPortfolio::with(vec![record("a", "AAA", None), record("b", "BBB", Some(42))]),
        MockProvider::new("PRIMARY").list("AAA", 7).price(7, dec!(1)).price(42, dec!(2)),
        None,
    );
    let watchlists = Arc::new(MockWatchlists::default());
    let reconciler = harness
        .reconciler(SyncOptions::default())
        .with_watchlist(WatchlistSync::new(watchlists.clone(), "portafoglio"));

    reconciler.run().await.unwrap();

    // 42 was already on the list
    assert_eq!(*watchlists.added.lock().unwrap(), vec![InstrumentId::from(7)]);
}
