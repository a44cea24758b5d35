//! Google service-account key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

use crate::errors::StorageError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a service-account JSON key needed to reach Firestore.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parses the key from its raw JSON form.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        let key: Self = serde_json::from_str(raw.trim())
            .map_err(|e| StorageError::InvalidKey(format!("not a service account key: {}", e)))?;
        key.validate()?;
        Ok(key)
    }

    /// Parses the key from base64-encoded JSON.
    pub fn from_base64(encoded: &str) -> Result<Self, StorageError> {
        let compact: String = encoded.split_whitespace().collect();
        let bytes = BASE64
            .decode(compact)
            .map_err(|e| StorageError::InvalidKey(format!("invalid base64: {}", e)))?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| StorageError::InvalidKey("decoded key is not UTF-8".to_string()))?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.project_id.trim().is_empty() {
            return Err(StorageError::InvalidKey("project_id is empty".to_string()));
        }
        if self.client_email.trim().is_empty() {
            return Err(StorageError::InvalidKey("client_email is empty".to_string()));
        }
        if !self.private_key.contains("PRIVATE KEY") {
            return Err(StorageError::InvalidKey(
                "private_key is not a PEM key".to_string(),
            ));
        }
        Ok(())
    }
}
