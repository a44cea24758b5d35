//! Keeps a provider watchlist in step with the resolved portfolio.
//!
//! Runs after the price pass. Nothing here can fail the run: every error is
//! logged and the post-pass gives up.

use std::collections::HashSet;
use std::sync::Arc;

use folio_market_data::{InstrumentId, MarketDataError, Watchlist, WatchlistApi};
use log::{debug, info, warn};

/// Adds resolved instruments to a named watchlist, creating it when absent.
pub struct WatchlistSync {
    api: Arc<dyn WatchlistApi>,
    name: String,
}

impl WatchlistSync {
    pub fn new(api: Arc<dyn WatchlistApi>, name: impl Into<String>) -> Self {
        Self {
            api,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many instruments were added.
    pub async fn sync(&self, instrument_ids: &[InstrumentId]) -> usize {
        match self.try_sync(instrument_ids).await {
            Ok(added) => added,
            Err(e) => {
                warn!("Watchlist '{}': sync failed: {}", self.name, e);
                0
            }
        }
    }

    async fn try_sync(&self, instrument_ids: &[InstrumentId]) -> Result<usize, MarketDataError> {
        let watchlist = self.find_or_create().await?;

        let present: HashSet<&InstrumentId> = watchlist.instrument_ids.iter().collect();
        let mut seen = HashSet::new();
        let missing: Vec<InstrumentId> = instrument_ids
            .iter()
            .filter(|id| !present.contains(id) && seen.insert(*id))
            .cloned()
            .collect();

        if missing.is_empty() {
            debug!("Watchlist '{}': already up to date", self.name);
            return Ok(0);
        }

        self.api.add_to_watchlist(&watchlist.id, &missing).await?;
        info!(
            "Watchlist '{}': added {} instruments",
            self.name,
            missing.len()
        );
        Ok(missing.len())
    }

    async fn find_or_create(&self) -> Result<Watchlist, MarketDataError> {
        let existing = self
            .api
            .list_watchlists()
            .await?
            .into_iter()
            .find(|w| w.name.trim().eq_ignore_ascii_case(self.name.trim()));

        match existing {
            Some(watchlist) => Ok(watchlist),
            None => {
                info!("Watchlist '{}': not found, creating it", self.name);
                self.api.create_watchlist(&self.name).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    #[derive(Default)]
    struct MockWatchlists {
        lists: Mutex<Vec<Watchlist>>,
        fail_list: bool,
    }

    #[async_trait]
    impl WatchlistApi for MockWatchlists {
        async fn list_watchlists(&self) -> Result<Vec<Watchlist>, MarketDataError> {
            if self.fail_list {
                return Err(MarketDataError::Provider {
                    provider: "ETORO".to_string(),
                    http_status: Some(500),
                    message: "boom".to_string(),
                });
            }
            Ok(self.lists.lock().unwrap().clone())
        }

        async fn create_watchlist(&self, name: &str) -> Result<Watchlist, MarketDataError> {
            let watchlist = Watchlist {
                id: format!("wl-{}", name),
                name: name.to_string(),
                instrument_ids: Vec::new(),
            };
            self.lists.lock().unwrap().push(watchlist.clone());
            Ok(watchlist)
        }

        async fn add_to_watchlist(
            &self,
            watchlist_id: &str,
            ids: &[InstrumentId],
        ) -> Result<(), MarketDataError> {
            let mut lists = self.lists.lock().unwrap();
            let list = lists.iter_mut().find(|w| w.id == watchlist_id).unwrap();
            list.instrument_ids.extend(ids.iter().cloned());
            Ok(())
        }
    }

    fn ids(raw: &[i64]) -> Vec<InstrumentId> {
        raw.iter().copied().map(InstrumentId::from).collect()
    }

    #[tokio::test]
    async fn test_creates_missing_watchlist() {
        let api = Arc::new(MockWatchlists::default());
        let sync = WatchlistSync::new(api.clone(), "Portafoglio");

        assert_eq!(sync.sync(&ids(&[7, 42])).await, 2);

        let lists = api.lists.lock().unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].instrument_ids, ids(&[7, 42]));
    }

    #[tokio::test]
    async fn test_adds_only_missing_instruments() {
        let api = Arc::new(MockWatchlists::default());
        api.lists.lock().unwrap().push(Watchlist {
            id: "wl-1".to_string(),
            name: "portafoglio".to_string(),
            instrument_ids: ids(&[7]),
        });
        let sync = WatchlistSync::new(api.clone(), "Portafoglio");

        assert_eq!(sync.sync(&ids(&[7, 42, 42])).await, 1);
        assert_eq!(sync.sync(&ids(&[7, 42])).await, 0);
        assert_eq!(api.lists.lock().unwrap()[0].instrument_ids, ids(&[7, 42]));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let api = Arc::new(MockWatchlists {
            fail_list: true,
            ..Default::default()
        });
        let sync = WatchlistSync::new(api, "Portafoglio");

        assert_eq!(sync.sync(&ids(&[7])).await, 0);
    }
}
