//! Portfolio records as the synchronization sees them.

mod record;
mod schema;
mod store;

pub use record::PortfolioRecord;
pub use schema::{
    RecordSchema, DEFAULT_INSTRUMENT_ID_FIELD, DEFAULT_PRICE_FIELD, DEFAULT_TICKER_FIELD,
    DEFAULT_UPDATED_AT_FIELD,
};
pub use store::PortfolioStore;
