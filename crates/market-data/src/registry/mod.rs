//! Provider orchestration.
//!
//! This module provides:
//! - Rate limiting per provider, shared by resolution and quoting
//! - Batched quote fetching with bounded concurrency
//! - Primary/fallback coordination
//! - Quote data validation

mod fallback;
mod fetcher;
mod rate_limiter;
mod validator;

pub use fallback::{CoordinatorOutcome, FallbackCoordinator, InstrumentState, QuoteTarget};
pub use fetcher::{partition, BatchOutcome, QuoteFetcher};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use validator::{QuoteValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
