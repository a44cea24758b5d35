//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the caller should handle the error.
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    /// Credentials were rejected or a token could not be obtained.
    /// This is fatal for the whole synchronization run.
    #[error("Authentication failed: {provider} - {message}")]
    Auth {
        /// The provider that rejected the credentials
        provider: String,
        /// What went wrong
        message: String,
    },

    /// A request to the provider failed (network failure or non-2xx answer).
    #[error("Provider error: {provider} (HTTP {}) - {message}", display_status(.http_status))]
    Provider {
        /// The provider that returned the error
        provider: String,
        /// HTTP status, when the provider answered at all
        http_status: Option<u16>,
        /// The error message from the provider
        message: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The ticker has no match at the provider.
    #[error("Ticker not found: {ticker} ({provider})")]
    NotFound {
        /// The provider that was asked
        provider: String,
        /// The ticker that could not be matched
        ticker: String,
    },

    /// The provider does not implement the requested operation.
    #[error("{provider} does not support '{operation}'")]
    NotSupported {
        /// Operation name (e.g. "search", "catalog")
        operation: String,
        /// The provider that was asked
        provider: String,
    },

    /// The provider answered with a body we could not make sense of.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that answered
        provider: String,
        /// Parse failure details
        message: String,
    },

    /// Persisting or reading an instrument mapping failed.
    #[error("Mapping storage error: {0}")]
    Storage(String),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "-".to_string(), |s| s.to_string())
}

impl MarketDataError {
    /// Builds a [`MarketDataError::Provider`] from a transport-level `reqwest` failure.
    pub fn from_reqwest(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                provider: provider.to_string(),
            };
        }
        Self::Provider {
            provider: provider.to_string(),
            http_status: error.status().map(|s| s.as_u16()),
            message: format!("Request failed: {}", error),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Provider {
    ///     provider: "ETORO".to_string(),
    ///     http_status: Some(429),
    ///     message: "slow down".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::NotFound {
    ///     provider: "ETORO".to_string(),
    ///     ticker: "ZZZZ".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Auth { .. } => RetryClass::Fatal,

            Self::Timeout { .. } => RetryClass::WithBackoff,

            Self::Provider { http_status, .. } => match http_status {
                Some(429) => RetryClass::WithBackoff,
                Some(status) if *status >= 500 => RetryClass::WithBackoff,
                // Connection refused, DNS failure and the like
                None => RetryClass::WithBackoff,
                Some(_) => RetryClass::NextProvider,
            },

            Self::NotSupported { .. } | Self::Storage(_) => RetryClass::NextProvider,

            Self::NotFound { .. } | Self::InvalidResponse { .. } => RetryClass::Never,
        }
    }

    /// True when the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        self.retry_class() == RetryClass::Fatal
    }

    /// The provider this error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Auth { provider, .. }
            | Self::Provider { provider, .. }
            | Self::Timeout { provider }
            | Self::NotFound { provider, .. }
            | Self::NotSupported { provider, .. }
            | Self::InvalidResponse { provider, .. } => Some(provider),
            Self::Storage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_error(status: Option<u16>) -> MarketDataError {
        MarketDataError::Provider {
            provider: "ETORO".to_string(),
            http_status: status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_auth_is_fatal() {
        let error = MarketDataError::Auth {
            provider: "ETORO_LIVE".to_string(),
            message: "refresh token revoked".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Fatal);
        assert!(error.is_fatal());
    }

    #[test]
    fn test_not_found_never_retries() {
        let error = MarketDataError::NotFound {
            provider: "ETORO".to_string(),
            ticker: "ZZZZ".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_rate_limited_and_server_errors_retry_with_backoff() {
        assert_eq!(provider_error(Some(429)).retry_class(), RetryClass::WithBackoff);
        assert_eq!(provider_error(Some(503)).retry_class(), RetryClass::WithBackoff);
        assert_eq!(provider_error(None).retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_client_errors_try_next_provider() {
        assert_eq!(provider_error(Some(400)).retry_class(), RetryClass::NextProvider);
        assert_eq!(provider_error(Some(404)).retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_timeout_retries_with_backoff() {
        let error = MarketDataError::Timeout {
            provider: "TWELVE_DATA".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            provider_error(Some(502)).to_string(),
            "Provider error: ETORO (HTTP 502) - boom"
        );
        assert_eq!(
            provider_error(None).to_string(),
            "Provider error: ETORO (HTTP -) - boom"
        );

        let error = MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: "ETORO_LIVE".to_string(),
        };
        assert_eq!(error.to_string(), "ETORO_LIVE does not support 'search'");
    }

    #[test]
    fn test_provider_attribution() {
        assert_eq!(provider_error(None).provider(), Some("ETORO"));
        assert_eq!(MarketDataError::Storage("x".into()).provider(), None);
    }
}
