//! Minimal Firestore REST client: paged listing, point reads and commits.

use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::FirestoreAuth;
use crate::errors::StorageError;
use crate::key::ServiceAccountKey;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A document as returned by the REST API.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, ending in `{collection}/{id}`.
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// The last path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    writes: &'a [Write],
}

/// One update inside a commit.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    update: DocumentUpdate,
    update_mask: DocumentMask,
    current_document: Precondition,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    update_transforms: Vec<FieldTransform>,
}

#[derive(Clone, Debug, Serialize)]
struct DocumentUpdate {
    name: String,
    fields: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask {
    field_paths: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct Precondition {
    exists: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform {
    field_path: String,
    set_to_server_value: &'static str,
}

impl Write {
    /// Updates only `fields` (each already typed) on a document that must exist.
    pub fn patch(name: String, fields: Map<String, Value>, field_paths: Vec<String>) -> Self {
        Self {
            update: DocumentUpdate { name, fields },
            update_mask: DocumentMask { field_paths },
            current_document: Precondition { exists: true },
            update_transforms: Vec::new(),
        }
    }

    /// Creates a document that must not exist yet.
    pub fn create(name: String, fields: Map<String, Value>) -> Self {
        let field_paths = fields.keys().map(|k| crate::value::field_path(k)).collect();
        Self {
            update: DocumentUpdate { name, fields },
            update_mask: DocumentMask { field_paths },
            current_document: Precondition { exists: false },
            update_transforms: Vec::new(),
        }
    }

    /// Also sets `field_path` to the server's commit time.
    pub fn with_request_time(mut self, field_path: String) -> Self {
        self.update_transforms.push(FieldTransform {
            field_path,
            set_to_server_value: "REQUEST_TIME",
        });
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub write_results: Vec<WriteResult>,
    #[serde(default)]
    pub commit_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    #[serde(default)]
    pub update_time: Option<String>,
    /// Typed values, one per transform.
    #[serde(default)]
    pub transform_results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Authenticated access to one project's default database.
pub struct FirestoreClient {
    client: Client,
    auth: FirestoreAuth,
    base_url: String,
    database: String,
}

impl FirestoreClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let database = format!("projects/{}/databases/(default)", key.project_id);
        let auth = FirestoreAuth::new(client.clone(), key)?;
        Ok(Self {
            client,
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
            database,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        self.auth.project_id()
    }

    /// Resource name of a document.
    pub fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database, collection, id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, self.database, path)
    }

    /// Lists every document of a collection, following page tokens.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let url = self.url(&format!("/documents/{}", collection));
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: ListDocumentsResponse =
                self.send_json(self.client.get(&url).query(&query), collection).await?;
            debug!("{}: fetched {} documents", collection, page.documents.len());
            documents.extend(page.documents);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }

    /// Reads one document; `None` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StorageError> {
        let url = self.url(&format!("/documents/{}/{}", collection, id));
        match self.send_json(self.client.get(&url), id).await {
            Ok(document) => Ok(Some(document)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Applies `writes` atomically.
    pub async fn commit(&self, writes: &[Write]) -> Result<CommitResponse, StorageError> {
        let url = self.url("/documents:commit");
        let target = writes
            .first()
            .map(|w| w.update.name.clone())
            .unwrap_or_default();
        self.send_json(self.client.post(&url).json(&CommitRequest { writes }), &target)
            .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: &str,
    ) -> Result<T, StorageError> {
        let token = self.auth.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let body = read_body(response, target).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn read_body(response: Response, target: &str) -> Result<String, StorageError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }

    let (message, code) = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| (e.error.message, e.error.status))
        .unwrap_or_else(|_| (body.chars().take(200).collect(), String::new()));

    Err(match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(target.to_string()),
        StatusCode::CONFLICT if code == "ALREADY_EXISTS" || code.is_empty() => {
            StorageError::AlreadyExists(target.to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Auth(message),
        _ => StorageError::Api {
            status: status.as_u16(),
            message: if code.is_empty() {
                message
            } else {
                format!("{}: {}", code, message)
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_id() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/portafoglio/abc123",
            "fields": { "nome": { "stringValue": "AAPL" } },
            "createTime": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(doc.id(), "abc123");
        assert!(doc.fields.contains_key("nome"));
    }

    #[test]
    fn test_list_response_without_documents() {
        let page: ListDocumentsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_patch_write_shape() {
        let mut fields = Map::new();
        fields.insert("prezzo_corrente".to_string(), json!({ "doubleValue": 55.0 }));
        let write = Write::patch(
            "projects/p/databases/(default)/documents/portafoglio/a".to_string(),
            fields,
            vec!["prezzo_corrente".to_string()],
        )
        .with_request_time("lastUpdated".to_string());

        assert_eq!(
            serde_json::to_value(&write).unwrap(),
            json!({
                "update": {
                    "name": "projects/p/databases/(default)/documents/portafoglio/a",
                    "fields": { "prezzo_corrente": { "doubleValue": 55.0 } }
                },
                "updateMask": { "fieldPaths": ["prezzo_corrente"] },
                "currentDocument": { "exists": true },
                "updateTransforms": [
                    { "fieldPath": "lastUpdated", "setToServerValue": "REQUEST_TIME" }
                ]
            })
        );
    }

    #[test]
    fn test_create_write_requires_absence() {
        let mut fields = Map::new();
        fields.insert("ticker".to_string(), json!({ "stringValue": "AAPL" }));
        let write = Write::create("n".to_string(), fields);
        let value = serde_json::to_value(&write).unwrap();

        assert_eq!(value["currentDocument"], json!({ "exists": false }));
        assert_eq!(value["updateMask"], json!({ "fieldPaths": ["ticker"] }));
        assert!(value.get("updateTransforms").is_none());
    }

    #[test]
    fn test_commit_response_transform_time() {
        let response: CommitResponse = serde_json::from_value(json!({
            "writeResults": [{
                "updateTime": "2026-10-18T08:00:00.5Z",
                "transformResults": [{ "timestampValue": "2026-10-18T08:00:00.5Z" }]
            }],
            "commitTime": "2026-10-18T08:00:00.5Z"
        }))
        .unwrap();
        assert_eq!(response.write_results[0].transform_results.len(), 1);
    }
}
