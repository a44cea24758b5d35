//! Ticker to instrument id resolution.
//!
//! # Resolution Precedence
//!
//! Given `(ticker, provider)`:
//!
//! 1. **Stored mapping** for `(provider, ticker)` -> use it, no network call
//! 2. **Else by the provider's [`ResolutionStrategy`](crate::provider::ResolutionStrategy):**
//!    - `Symbol`: the ticker is the id
//!    - `Catalog`: case-insensitive lookup in the provider catalog (fetched once)
//!    - `Search`: one rate-limited search call, exact full-symbol match only
//! 3. **No match** -> [`Resolution::NotFound`]
//!
//! Every successful resolution is persisted through the [`MappingStore`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use folio_market_data::resolver::{InstrumentResolver, MemoryMappingStore, Resolution};
//! use folio_market_data::registry::RateLimiter;
//!
//! let resolver = InstrumentResolver::new(
//!     Arc::new(MemoryMappingStore::new()),
//!     Arc::new(RateLimiter::new()),
//! );
//!
//! match resolver.resolve(&ticker, provider.as_ref()).await? {
//!     Resolution::Cached(id) | Resolution::Resolved(id) => println!("{} -> {}", ticker, id),
//!     Resolution::NotFound => println!("{} not listed", ticker),
//! }
//! ```

mod instrument_resolver;
mod mapping_store;
mod traits;

pub use instrument_resolver::InstrumentResolver;
pub use mapping_store::MemoryMappingStore;
pub use traits::{MappingStore, Resolution};
