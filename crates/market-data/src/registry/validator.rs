//! Quote data validation.
//!
//! Validates quote data from providers before it enters a batch result:
//! - Strictly positive prices
//! - Uncrossed books (ask >= bid) for midpoint quotes
//! - Reasonable value ranges

use chrono::Utc;
use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::Quote;

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the quote.
    Hard,
    /// Soft warning - accept quote but log warning.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Description of the issue.
    pub message: String,
}

/// Quote validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Prices above this are logged as suspicious.
    pub max_price: Option<Decimal>,
    /// Quotes older than this many hours are logged as stale.
    pub stale_after_hours: Option<i64>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_price: Some(Decimal::from(1_000_000_000i64)), // 1 billion as sanity check
            stale_after_hours: Some(96),
        }
    }
}

/// Quote data validator.
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Rejects a crossed book. Providers call this before deriving a midpoint.
    pub fn check_spread(provider: &str, bid: Decimal, ask: Decimal) -> Result<(), MarketDataError> {
        if ask < bid {
            return Err(MarketDataError::InvalidResponse {
                provider: provider.to_string(),
                message: format!("crossed book: bid {} > ask {}", bid, ask),
            });
        }
        Ok(())
    }

    /// Validate a quote.
    ///
    /// Returns Ok(()) if the quote is valid, or Err with details if invalid.
    /// Warnings are logged but do not cause rejection.
    pub fn validate(&self, quote: &Quote) -> Result<(), MarketDataError> {
        let issues = self.collect_issues(quote);

        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::InvalidResponse {
                provider: quote.provider.to_string(),
                message: format!("{}: {}", quote.instrument_id, errors.join("; ")),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Quote validation warning for {} ({}): {}",
                quote.instrument_id, quote.provider, issue.message
            );
        }

        Ok(())
    }

    fn collect_issues(&self, quote: &Quote) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if quote.price <= Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Non-positive price: {}", quote.price),
            });
        }

        if let Some(max) = self.config.max_price {
            if quote.price > max {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!("Price {} exceeds sanity limit {}", quote.price, max),
                });
            }
        }

        if let Some(hours) = self.config.stale_after_hours {
            let age = Utc::now().signed_duration_since(quote.timestamp);
            if age.num_hours() > hours {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!("Quote is {} hours old", age.num_hours()),
                });
            }
        }

        issues
    }
}

impl Default for QuoteValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use crate::models::InstrumentId;

    fn quote(price: Decimal) -> Quote {
        Quote::last(InstrumentId::from(1), price, "TEST")
    }

    #[test]
    fn test_valid_quote() {
        assert!(QuoteValidator::new().validate(&quote(dec!(10.2))).is_ok());
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let validator = QuoteValidator::new();
        assert!(validator.validate(&quote(dec!(0))).is_err());
        assert!(validator.validate(&quote(dec!(-1.5))).is_err());
    }

    #[test]
    fn test_extreme_price_is_only_a_warning() {
        let validator = QuoteValidator::new();
        assert!(validator.validate(&quote(dec!(2000000000))).is_ok());
    }

    #[test]
    fn test_stale_quote_is_only_a_warning() {
        let old = quote(dec!(5)).with_timestamp(Utc::now() - Duration::days(30));
        let issues = QuoteValidator::new().collect_issues(&old);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ValidationSeverity::Soft);
    }

    #[test]
    fn test_crossed_book_rejected() {
        assert!(QuoteValidator::check_spread("ETORO", dec!(10.0), dec!(10.4)).is_ok());
        assert!(QuoteValidator::check_spread("ETORO", dec!(10.0), dec!(10.0)).is_ok());
        assert!(QuoteValidator::check_spread("ETORO", dec!(10.4), dec!(10.0)).is_err());
    }

    #[test]
    fn test_custom_config_without_limits() {
        let validator = QuoteValidator::with_config(ValidatorConfig {
            max_price: None,
            stale_after_hours: None,
        });
        let old = quote(dec!(5000000000)).with_timestamp(Utc::now() - Duration::days(365));
        assert!(validator.collect_issues(&old).is_empty());
    }
}
