use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// eToro OAuth-authenticated API (catalog + live rates)
pub const ETORO_LIVE: &str = "ETORO_LIVE";

/// eToro public API (search + rates, API key pair)
pub const ETORO: &str = "ETORO";

/// Twelve Data REST API
pub const TWELVE_DATA: &str = "TWELVE_DATA";

/// Yahoo Finance
pub const YAHOO: &str = "YAHOO";
