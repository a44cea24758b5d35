//! Portfolio storage trait.
//!
//! This trait abstracts the document database, allowing different storage
//! backends (Firestore, in-memory) to be used interchangeably.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_market_data::InstrumentId;
use rust_decimal::Decimal;

use super::record::PortfolioRecord;
use crate::errors::Result;

/// Storage interface for portfolio records.
///
/// # Design Notes
///
/// - Writes are point updates of the named fields only; other document
///   fields belong to the dashboard and are never touched
/// - Records are never created or deleted here
/// - Each write is independent; there is no transaction across records
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Loads every record of the collection, decoded through the store's schema.
    async fn load_records(&self) -> Result<Vec<PortfolioRecord>>;

    /// Persists a newly resolved instrument id on one record.
    async fn set_instrument_id(&self, record_id: &str, instrument_id: &InstrumentId) -> Result<()>;

    /// Writes the current price and returns the timestamp stored alongside it.
    async fn update_price(&self, record_id: &str, price: Decimal) -> Result<DateTime<Utc>>;
}
