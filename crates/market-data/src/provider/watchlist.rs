//! Watchlist management for providers that expose it.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::InstrumentId;

/// A named watchlist on the provider side.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Watchlist {
    pub id: String,
    pub name: String,
    /// Instruments already on the list, when the provider reports them.
    pub instrument_ids: Vec<InstrumentId>,
}

/// Operations needed to keep a provider watchlist in sync with the portfolio.
#[async_trait]
pub trait WatchlistApi: Send + Sync {
    async fn list_watchlists(&self) -> Result<Vec<Watchlist>, MarketDataError>;

    async fn create_watchlist(&self, name: &str) -> Result<Watchlist, MarketDataError>;

    async fn add_to_watchlist(
        &self,
        watchlist_id: &str,
        ids: &[InstrumentId],
    ) -> Result<(), MarketDataError>;
}
