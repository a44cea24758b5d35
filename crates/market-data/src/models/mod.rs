//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Provider identifier alias and the known provider ids
//! - `instrument` - Ticker, provider-specific InstrumentId and the ticker -> id mapping
//! - `quote` - Quote and price derivation (bid/ask midpoint or last trade)
//! - `search` - Catalog and search result entries

mod instrument;
mod quote;
mod search;
mod types;

pub use instrument::{InstrumentId, InstrumentMapping, Ticker};
pub use quote::{PriceKind, Quote};
pub use search::{CatalogEntry, SearchResult};
pub use types::{ProviderId, ETORO, ETORO_LIVE, TWELVE_DATA, YAHOO};
