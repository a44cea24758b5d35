//! Firestore storage implementation for Folio.
//!
//! Talks to the Firestore REST API with a service-account key:
//! - [`FirestoreStore`] implements `folio_core::PortfolioStore` over the portfolio collection
//! - [`FirestoreMappingStore`] implements `folio_market_data::MappingStore`
//!
//! Writes are point updates (`updateMask`) guarded by existence preconditions,
//! so fields owned by the dashboard are never touched.

pub mod auth;
pub mod client;
pub mod errors;
pub mod key;
pub mod store;
pub mod value;

pub use auth::FirestoreAuth;
pub use client::FirestoreClient;
pub use errors::StorageError;
pub use key::ServiceAccountKey;
pub use store::{FirestoreMappingStore, FirestoreStore};
