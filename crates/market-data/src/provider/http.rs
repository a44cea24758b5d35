//! Response handling shared by the HTTP-based providers.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::MarketDataError;

/// Maximum number of body characters carried into an error message.
const ERROR_BODY_PREVIEW: usize = 200;

/// Reads a provider response body, mapping HTTP failures onto [`MarketDataError`].
///
/// - 401/403 -> `Auth`
/// - any other non-2xx -> `Provider` with the status code
pub(crate) async fn read_body(
    provider: &str,
    response: Response,
) -> Result<String, MarketDataError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| MarketDataError::from_reqwest(provider, e))?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(MarketDataError::Auth {
            provider: provider.to_string(),
            message: format!("HTTP {} - {}", status.as_u16(), preview(&body)),
        });
    }

    if !status.is_success() {
        return Err(MarketDataError::Provider {
            provider: provider.to_string(),
            http_status: Some(status.as_u16()),
            message: preview(&body),
        });
    }

    Ok(body)
}

/// Like [`read_body`], then decodes the body as JSON (`InvalidResponse` on failure).
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, MarketDataError> {
    let body = read_body(provider, response).await?;
    parse_json(provider, &body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: &str,
    body: &str,
) -> Result<T, MarketDataError> {
    serde_json::from_str(body).map_err(|e| MarketDataError::InvalidResponse {
        provider: provider.to_string(),
        message: format!("{} - {}", e, preview(body)),
    })
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}

/// Comma-separated id list as expected by list-style query parameters.
pub(crate) fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstrumentId;

    #[test]
    fn test_join_ids() {
        let ids = vec![InstrumentId::from(1), InstrumentId::from(22), InstrumentId::from(333)];
        assert_eq!(join_ids(&ids), "1,22,333");
        assert_eq!(join_ids::<InstrumentId>(&[]), "");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), ERROR_BODY_PREVIEW);
    }
}
