//! Folio Core - portfolio records and the price synchronization pass.
//!
//! This crate is database-agnostic: it defines the [`PortfolioStore`] trait
//! that the `storage-firestore` crate implements, and drives the market data
//! crate to resolve instruments and write prices back.

pub mod errors;
pub mod portfolio;
pub mod sync;
pub mod watchlist;

// Re-export common types
pub use portfolio::{PortfolioRecord, PortfolioStore, RecordSchema};
pub use sync::{Reconciler, SyncOptions, SyncSummary};
pub use watchlist::WatchlistSync;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
pub use errors::DatabaseError;
