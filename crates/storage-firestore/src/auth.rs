//! Service-account token exchange (JWT bearer grant).

use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::StorageError;
use crate::key::ServiceAccountKey;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion (the maximum Google accepts).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Mints and caches OAuth access tokens for a service account.
pub struct FirestoreAuth {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl FirestoreAuth {
    /// Fails when the private key is not a usable RSA PEM key.
    pub fn new(client: Client, key: ServiceAccountKey) -> Result<Self, StorageError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StorageError::InvalidKey(format!("private_key: {}", e)))?;
        Ok(Self {
            client,
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    /// Returns a bearer token, exchanging a fresh assertion when needed.
    pub async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Exchanging service account assertion at {}", self.key.token_uri);
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Auth(format!(
                "token exchange returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let lifetime =
            Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS as u64));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });

        Ok(token.access_token)
    }

    fn assertion(&self) -> Result<String, StorageError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let claims = claims(&self.key, Utc::now().timestamp());
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }
}

fn claims(key: &ServiceAccountKey, now: i64) -> Claims<'_> {
    Claims {
        iss: &key.client_email,
        scope: DATASTORE_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    }
}
