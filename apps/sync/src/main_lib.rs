use std::sync::Arc;

use folio_core::{PortfolioStore, Reconciler, SyncOptions, WatchlistSync};
use folio_market_data::{
    FallbackCoordinator, InstrumentResolver, MappingStore, MarketDataProvider, MemoryMappingStore,
    QuoteFetcher, RateLimiter,
};
use folio_storage_firestore::{FirestoreMappingStore, FirestoreStore};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};
use crate::credentials;

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

/// Wires storage, providers and the reconciler from the configuration.
pub fn build_reconciler(config: &Config) -> anyhow::Result<Reconciler> {
    let client = Arc::new(credentials::firestore_client(config)?);
    tracing::info!(
        "Firestore project {}, collection '{}'",
        client.project_id(),
        config.collection
    );

    let store: Arc<dyn PortfolioStore> = Arc::new(FirestoreStore::new(
        client.clone(),
        config.collection.clone(),
        config.schema.clone(),
    ));

    let mappings: Arc<dyn MappingStore> = match &config.mapping_collection {
        Some(collection) => {
            tracing::info!("Instrument mappings persisted to '{}'", collection);
            Arc::new(FirestoreMappingStore::new(client.clone(), collection.clone()))
        }
        None => Arc::new(MemoryMappingStore::new()),
    };

    let primary = credentials::provider(config.primary, config)?;
    let fallback = config
        .fallback
        .map(|kind| credentials::provider(kind, config))
        .transpose()?;
    tracing::info!(
        "Primary provider {}, fallback {}",
        primary.id(),
        fallback.as_ref().map(|p| p.id()).unwrap_or("none")
    );

    let limiter = Arc::new(RateLimiter::new());
    let resolver = Arc::new(InstrumentResolver::new(mappings, limiter.clone()));
    let fetcher = Arc::new(QuoteFetcher::new(limiter).with_concurrency(config.concurrency));
    let coordinator = Arc::new(
        FallbackCoordinator::new(fetcher, resolver.clone(), primary, fallback)
            .with_concurrency(config.concurrency),
    );

    let mut reconciler = Reconciler::new(store, resolver, coordinator).with_options(SyncOptions {
        concurrency: config.concurrency,
        timeout: config.timeout,
        resolve_only: config.resolve_only,
    });

    if let (Some(name), Some(api)) = (&config.watchlist, credentials::watchlist_api(config)?) {
        tracing::info!("Resolved instruments will be added to watchlist '{}'", name);
        reconciler = reconciler.with_watchlist(WatchlistSync::new(api, name.clone()));
    }

    Ok(reconciler)
}
