//! Environment configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use folio_core::RecordSchema;
use thiserror::Error;

const DEFAULT_COLLECTION: &str = "portafoglio";
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration key: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Market data provider selectable as primary or fallback.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProviderKind {
    EtoroLive,
    Etoro,
    TwelveData,
    Yahoo,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "etoro_live" => Ok(Self::EtoroLive),
            "etoro" => Ok(Self::Etoro),
            "twelve_data" => Ok(Self::TwelveData),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(format!(
                "unknown provider '{}', expected etoro_live, etoro, twelve_data or yahoo",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Raw credential material. Only `credentials` reads it.
#[derive(Clone, Default)]
pub struct Secrets {
    pub etoro_api_key: Option<String>,
    pub etoro_user_key: Option<String>,
    pub etoro_client_id: Option<String>,
    pub etoro_client_secret: Option<String>,
    pub etoro_refresh_token: Option<String>,
    pub etoro_access_token: Option<String>,
    pub twelve_data_api_key: Option<String>,
    pub firebase_key_json: Option<String>,
    pub firebase_key_base64: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secrets(..)")
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub collection: String,
    pub mapping_collection: Option<String>,
    pub primary: ProviderKind,
    pub fallback: Option<ProviderKind>,
    pub schema: RecordSchema,
    pub concurrency: usize,
    pub timeout: Duration,
    pub provider_retries: u32,
    pub resolve_only: bool,
    pub log_format: LogFormat,
    pub watchlist: Option<String>,
    pub etoro_api_url: Option<String>,
    pub etoro_live_url: Option<String>,
    pub etoro_token_url: Option<String>,
    pub secrets: Secrets,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secrets = Secrets {
            etoro_api_key: get("ETORO_PUBLIC_API_KEY"),
            etoro_user_key: get("ETORO_USER_KEY"),
            etoro_client_id: get("ETORO_CLIENT_ID"),
            etoro_client_secret: get("ETORO_CLIENT_SECRET"),
            etoro_refresh_token: get("ETORO_REFRESH_TOKEN"),
            etoro_access_token: get("ETORO_ACCESS_TOKEN"),
            twelve_data_api_key: get("TWELVE_DATA_API_KEY"),
            firebase_key_json: get("FIREBASE_KEY_JSON"),
            firebase_key_base64: get("FIREBASE_KEY_BASE64"),
        };

        let primary = match get("FOLIO_PRIMARY_PROVIDER") {
            Some(raw) => parse_provider("FOLIO_PRIMARY_PROVIDER", &raw)?,
            None => ProviderKind::Etoro,
        };

        let fallback = match get("FOLIO_FALLBACK_PROVIDER") {
            Some(raw) if raw.eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(parse_provider("FOLIO_FALLBACK_PROVIDER", &raw)?),
            None if secrets.twelve_data_api_key.is_some() => Some(ProviderKind::TwelveData),
            None => None,
        };
        // Primary-only setups fall back to nothing rather than to themselves
        let fallback = fallback.filter(|kind| *kind != primary);

        let defaults = RecordSchema::default();
        let schema = RecordSchema {
            ticker_field: get("FOLIO_TICKER_FIELD").unwrap_or(defaults.ticker_field),
            instrument_id_field: get("FOLIO_INSTRUMENT_ID_FIELD")
                .unwrap_or(defaults.instrument_id_field),
            price_field: get("FOLIO_PRICE_FIELD").unwrap_or(defaults.price_field),
            updated_at_field: get("FOLIO_UPDATED_AT_FIELD").unwrap_or(defaults.updated_at_field),
            ticker_from_document_id: parse_bool(
                "FOLIO_TICKER_FROM_DOC_ID",
                get("FOLIO_TICKER_FROM_DOC_ID"),
            )?,
        };

        let concurrency: usize = parse_number(
            "FOLIO_CONCURRENCY",
            get("FOLIO_CONCURRENCY"),
            DEFAULT_CONCURRENCY,
        )?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "FOLIO_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let timeout_secs: u64 = parse_number(
            "FOLIO_TIMEOUT_SECS",
            get("FOLIO_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;

        let log_format = match get("FOLIO_LOG_FORMAT") {
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) if raw.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(raw) => {
                return Err(ConfigError::Invalid {
                    key: "FOLIO_LOG_FORMAT",
                    value: raw,
                    reason: "expected text or json".to_string(),
                })
            }
            None => LogFormat::Text,
        };

        Ok(Self {
            collection: get("FOLIO_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            mapping_collection: get("FOLIO_MAPPING_COLLECTION"),
            primary,
            fallback,
            schema,
            concurrency,
            timeout: Duration::from_secs(timeout_secs),
            provider_retries: parse_number(
                "FOLIO_PROVIDER_RETRIES",
                get("FOLIO_PROVIDER_RETRIES"),
                0,
            )?,
            resolve_only: parse_bool("FOLIO_RESOLVE_ONLY", get("FOLIO_RESOLVE_ONLY"))?,
            log_format,
            watchlist: get("ETORO_WATCHLIST"),
            etoro_api_url: get("ETORO_API_URL"),
            etoro_live_url: get("ETORO_LIVE_URL"),
            etoro_token_url: get("ETORO_TOKEN_URL"),
            secrets,
        })
    }
}

fn parse_provider(key: &'static str, raw: &str) -> Result<ProviderKind, ConfigError> {
    raw.parse().map_err(|reason| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason,
    })
}

fn parse_bool(key: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_number<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.collection, "portafoglio");
        assert_eq!(config.primary, ProviderKind::Etoro);
        assert_eq!(config.fallback, None);
        assert_eq!(config.schema, RecordSchema::default());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.provider_retries, 0);
        assert!(!config.resolve_only);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_twelve_data_key_enables_fallback() {
        let config = load(&[("TWELVE_DATA_API_KEY", "td")]).unwrap();
        assert_eq!(config.fallback, Some(ProviderKind::TwelveData));

        let disabled = [("TWELVE_DATA_API_KEY", "td"), ("FOLIO_FALLBACK_PROVIDER", "none")];
        assert_eq!(load(&disabled).unwrap().fallback, None);
    }

    #[test]
    fn test_fallback_equal_to_primary_is_dropped() {
        let config = load(&[
            ("FOLIO_PRIMARY_PROVIDER", "twelve_data"),
            ("TWELVE_DATA_API_KEY", "td"),
        ])
        .unwrap();
        assert_eq!(config.primary, ProviderKind::TwelveData);
        assert_eq!(config.fallback, None);
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = load(&[("FOLIO_PRIMARY_PROVIDER", "bloomberg")]).unwrap_err();
        assert!(err.to_string().contains("FOLIO_PRIMARY_PROVIDER"));

        let err = load(&[("FOLIO_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("FOLIO_TIMEOUT_SECS"));

        let err = load(&[("FOLIO_CONCURRENCY", "0")]).unwrap_err();
        assert!(err.to_string().contains("FOLIO_CONCURRENCY"));

        let err = load(&[("FOLIO_RESOLVE_ONLY", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("FOLIO_RESOLVE_ONLY"));
    }

    #[test]
    fn test_schema_overrides() {
        let config = load(&[
            ("FOLIO_TICKER_FIELD", "symbol"),
            ("FOLIO_PRICE_FIELD", "price"),
            ("FOLIO_TICKER_FROM_DOC_ID", "true"),
            ("FOLIO_LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.schema.ticker_field, "symbol");
        assert_eq!(config.schema.price_field, "price");
        assert_eq!(config.schema.instrument_id_field, "instrumentId");
        assert!(config.schema.ticker_from_document_id);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("FOLIO_COLLECTION", "  "), ("ETORO_WATCHLIST", "")]).unwrap();
        assert_eq!(config.collection, "portafoglio");
        assert_eq!(config.watchlist, None);
    }

    #[test]
    fn test_secrets_are_redacted() {
        let config = load(&[("ETORO_PUBLIC_API_KEY", "super-secret")]).unwrap();
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
