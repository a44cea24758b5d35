//! Bearer token handling for the eToro live API.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::errors::MarketDataError;
use crate::models::ETORO_LIVE;

/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Assumed lifetime when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// OAuth refresh-token credentials.
#[derive(Clone)]
pub struct OAuthRefresh {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for OAuthRefresh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthRefresh")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Where bearer tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// A pre-issued access token. Cannot be renewed.
    Static(String),
    /// Minted (and re-minted) from a refresh token.
    Refresh(OAuthRefresh),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(..)"),
            Self::Refresh(oauth) => f.debug_tuple("Refresh").field(oauth).finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

struct TokenState {
    cached: Option<CachedToken>,
    /// Latest refresh token; some servers rotate it on every exchange.
    refresh_token: Option<String>,
}

/// Caches the bearer token and renews it when it expires or is rejected.
pub struct TokenManager {
    client: Client,
    source: TokenSource,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(source: TokenSource) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        let refresh_token = match &source {
            TokenSource::Refresh(oauth) => Some(oauth.refresh_token.clone()),
            TokenSource::Static(_) => None,
        };

        Self {
            client,
            source,
            state: Mutex::new(TokenState {
                cached: None,
                refresh_token,
            }),
        }
    }

    /// True when a rejected token can be replaced by a fresh one.
    pub fn can_refresh(&self) -> bool {
        matches!(self.source, TokenSource::Refresh(_))
    }

    /// Returns a usable bearer token, minting one if the cache is empty or stale.
    pub async fn bearer(&self) -> Result<String, MarketDataError> {
        let oauth = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Refresh(oauth) => oauth,
        };

        let mut state = self.state.lock().await;
        if let Some(cached) = &state.cached {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let refresh_token = state
            .refresh_token
            .clone()
            .unwrap_or_else(|| oauth.refresh_token.clone());
        let minted = self.mint(oauth, &refresh_token).await?;

        let lifetime = minted
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        state.cached = Some(CachedToken {
            value: minted.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        if let Some(rotated) = minted.refresh_token {
            state.refresh_token = Some(rotated);
        }

        Ok(minted.access_token)
    }

    /// Drops the cached token so the next [`bearer`](Self::bearer) call mints a new one.
    pub async fn invalidate(&self) {
        self.state.lock().await.cached = None;
    }

    async fn mint(
        &self,
        oauth: &OAuthRefresh,
        refresh_token: &str,
    ) -> Result<TokenResponse, MarketDataError> {
        debug!("Refreshing eToro access token from: {}", oauth.token_url);

        let response = self
            .client
            .post(&oauth.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MarketDataError::Auth {
                provider: ETORO_LIVE.to_string(),
                message: format!("Token request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MarketDataError::Auth {
            provider: ETORO_LIVE.to_string(),
            message: format!("Failed to read token response: {}", e),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|err| err.error_description.or(err.error))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            error!("eToro token refresh failed: {}", message);
            return Err(MarketDataError::Auth {
                provider: ETORO_LIVE.to_string(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| MarketDataError::Auth {
            provider: ETORO_LIVE.to_string(),
            message: format!("Failed to parse token response: {}", e),
        })
    }
}
