//! Turns raw credential material into ready clients.
//!
//! Everything secret is decoded and checked here, once, at start-up. The rest
//! of the program only sees built providers and stores.

use std::sync::Arc;

use folio_market_data::{
    EtoroLiveProvider, EtoroProvider, MarketDataProvider, OAuthRefresh, RetryingProvider,
    TokenManager, TokenSource, TwelveDataProvider, WatchlistApi, YahooProvider,
};
use folio_storage_firestore::{FirestoreClient, ServiceAccountKey};
use thiserror::Error;

use crate::config::{Config, ConfigError, ProviderKind};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid {what}: {message}")]
    Invalid { what: &'static str, message: String },
}

/// Builds the Firestore client from `FIREBASE_KEY_JSON`, else `FIREBASE_KEY_BASE64`.
pub fn firestore_client(config: &Config) -> Result<FirestoreClient, CredentialError> {
    let secrets = &config.secrets;
    let key = match (&secrets.firebase_key_json, &secrets.firebase_key_base64) {
        (Some(json), _) => ServiceAccountKey::from_json(json),
        (None, Some(encoded)) => ServiceAccountKey::from_base64(encoded),
        (None, None) => return Err(ConfigError::Missing("FIREBASE_KEY_JSON").into()),
    }
    .map_err(|e| CredentialError::Invalid {
        what: "Firebase service account key",
        message: e.to_string(),
    })?;

    FirestoreClient::new(key).map_err(|e| CredentialError::Invalid {
        what: "Firebase service account key",
        message: e.to_string(),
    })
}

/// Builds one provider, wrapped in retries when configured.
pub fn provider(
    kind: ProviderKind,
    config: &Config,
) -> Result<Arc<dyn MarketDataProvider>, CredentialError> {
    let provider: Arc<dyn MarketDataProvider> = match kind {
        ProviderKind::Etoro => Arc::new(etoro(config)?),
        ProviderKind::EtoroLive => {
            let tokens = Arc::new(TokenManager::new(etoro_token_source(config)?));
            let provider = EtoroLiveProvider::new(tokens);
            match &config.etoro_live_url {
                Some(url) => Arc::new(provider.with_base_url(url.as_str())),
                None => Arc::new(provider),
            }
        }
        ProviderKind::TwelveData => {
            let key = required(&config.secrets.twelve_data_api_key, "TWELVE_DATA_API_KEY")?;
            Arc::new(TwelveDataProvider::new(key))
        }
        ProviderKind::Yahoo => Arc::new(YahooProvider::new().map_err(|e| {
            CredentialError::Invalid {
                what: "Yahoo Finance client",
                message: e.to_string(),
            }
        })?),
    };

    if config.provider_retries > 0 {
        Ok(Arc::new(RetryingProvider::new(
            provider,
            config.provider_retries,
        )))
    } else {
        Ok(provider)
    }
}

/// The eToro public API client used for watchlists, when one is configured.
pub fn watchlist_api(config: &Config) -> Result<Option<Arc<dyn WatchlistApi>>, CredentialError> {
    if config.watchlist.is_none() {
        return Ok(None);
    }
    Ok(Some(Arc::new(etoro(config)?)))
}

fn etoro(config: &Config) -> Result<EtoroProvider, CredentialError> {
    let api_key = required(&config.secrets.etoro_api_key, "ETORO_PUBLIC_API_KEY")?;
    let user_key = required(&config.secrets.etoro_user_key, "ETORO_USER_KEY")?;
    let provider = EtoroProvider::new(api_key, user_key);
    Ok(match &config.etoro_api_url {
        Some(url) => provider.with_base_url(url.as_str()),
        None => provider,
    })
}

/// Refresh-token credentials win over a raw access token.
fn etoro_token_source(config: &Config) -> Result<TokenSource, CredentialError> {
    let secrets = &config.secrets;
    if let Some(refresh_token) = &secrets.etoro_refresh_token {
        return Ok(TokenSource::Refresh(OAuthRefresh {
            token_url: required(&config.etoro_token_url, "ETORO_TOKEN_URL")?,
            client_id: required(&secrets.etoro_client_id, "ETORO_CLIENT_ID")?,
            client_secret: required(&secrets.etoro_client_secret, "ETORO_CLIENT_SECRET")?,
            refresh_token: refresh_token.clone(),
        }));
    }

    match &secrets.etoro_access_token {
        Some(token) => Ok(TokenSource::Static(token.clone())),
        None => Err(ConfigError::Missing("ETORO_REFRESH_TOKEN").into()),
    }
}

fn required(value: &Option<String>, key: &'static str) -> Result<String, CredentialError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::Missing(key).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_etoro_requires_key_pair() {
        let err = provider(ProviderKind::Etoro, &load(&[("ETORO_PUBLIC_API_KEY", "k")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("ETORO_USER_KEY"));

        let config = load(&[("ETORO_PUBLIC_API_KEY", "k"), ("ETORO_USER_KEY", "u")]);
        assert_eq!(provider(ProviderKind::Etoro, &config).unwrap().id(), "ETORO");
    }

    #[test]
    fn test_live_token_source_prefers_refresh() {
        let config = load(&[
            ("ETORO_REFRESH_TOKEN", "r"),
            ("ETORO_CLIENT_ID", "id"),
            ("ETORO_CLIENT_SECRET", "s"),
            ("ETORO_TOKEN_URL", "https://auth.example/token"),
            ("ETORO_ACCESS_TOKEN", "a"),
        ]);
        assert!(matches!(
            etoro_token_source(&config).unwrap(),
            TokenSource::Refresh(_)
        ));

        let config = load(&[("ETORO_ACCESS_TOKEN", "a")]);
        assert!(matches!(
            etoro_token_source(&config).unwrap(),
            TokenSource::Static(_)
        ));
    }

    #[test]
    fn test_refresh_flow_needs_client_credentials() {
        let config = load(&[
            ("ETORO_REFRESH_TOKEN", "r"),
            ("ETORO_TOKEN_URL", "https://auth.example/token"),
        ]);
        let err = etoro_token_source(&config).unwrap_err();
        assert!(err.to_string().contains("ETORO_CLIENT_ID"));
    }

    #[test]
    fn test_missing_firebase_key() {
        let err = firestore_client(&load(&[])).err().unwrap();
        assert!(err.to_string().contains("FIREBASE_KEY_JSON"));
    }

    #[test]
    fn test_watchlist_only_when_named() {
        assert!(watchlist_api(&load(&[])).unwrap().is_none());
        assert!(watchlist_api(&load(&[("ETORO_WATCHLIST", "Portafoglio")])).is_err());
    }

    #[test]
    fn test_retries_wrap_provider() {
        let config = load(&[("TWELVE_DATA_API_KEY", "td"), ("FOLIO_PROVIDER_RETRIES", "2")]);
        let provider = provider(ProviderKind::TwelveData, &config).unwrap();
        assert_eq!(provider.id(), "TWELVE_DATA");
    }
}
