use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{InstrumentId, InstrumentMapping, Ticker};

use super::traits::MappingStore;

/// In-process mapping store. Lives as long as the process does.
#[derive(Default)]
pub struct MemoryMappingStore {
    mappings: Mutex<HashMap<(String, Ticker), InstrumentId>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<(String, Ticker), InstrumentId>>, MarketDataError> {
        self.mappings
            .lock()
            .map_err(|_| MarketDataError::Storage("mapping store lock poisoned".to_string()))
    }

    /// Number of stored mappings across all providers.
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn get(
        &self,
        provider: &str,
        ticker: &Ticker,
    ) -> Result<Option<InstrumentId>, MarketDataError> {
        Ok(self
            .lock()?
            .get(&(provider.to_string(), ticker.clone()))
            .cloned())
    }

    async fn put(&self, mapping: &InstrumentMapping) -> Result<InstrumentId, MarketDataError> {
        let mut mappings = self.lock()?;
        let stored = mappings
            .entry((mapping.provider.to_string(), mapping.ticker.clone()))
            .or_insert_with(|| mapping.instrument_id.clone());
        Ok(stored.clone())
    }
}
