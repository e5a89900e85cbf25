//! HTTP implementation of the collaborator gateways.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, instrument, warn};

use casewise_core::defaults::API_KEY_HEADER;
use casewise_core::{
    AdminAccount, CaseNote, CaseNoteGateway, Error, FileStatus, FileStatusGateway, NewCaseNote,
    Result, SystemGateway, UploadedDocument,
};

use crate::config::GatewayConfig;

/// `GET /api/files/pending` response body.
#[derive(Debug, Deserialize)]
struct PendingFilesResponse {
    #[serde(default)]
    files: Vec<JsonValue>,
}

/// `POST /api/notes/patient/{id}` response body.
#[derive(Debug, Deserialize)]
struct CreatedNoteResponse {
    #[serde(rename = "caseNote")]
    case_note: CaseNote,
}

/// `POST /api/cleanup` response body.
#[derive(Debug, Deserialize)]
struct CleanupResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Error body returned by the collaborator on failure.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Gateway to the collaborator service over HTTP.
///
/// Authenticated calls carry the static service credential in `x-api-key`.
/// Every call has its own timeout: the short one for liveness, the long one
/// for everything else, so a hung collaborator cannot stall the worker
/// beyond that bound.
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
    base: Url,
}

impl HttpGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid BACKEND_URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "BACKEND_URL cannot be used as a base: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            api_key = %config.masked_api_key(),
            "Initializing collaborator gateway"
        );

        Ok(Self {
            client,
            config,
            base,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build a URL from path segments; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authenticated(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(API_KEY_HEADER, &self.config.api_key)
    }

    fn data_call(&self, req: RequestBuilder) -> RequestBuilder {
        req.timeout(self.config.long_timeout())
    }
}

/// Turn a non-success response into a `Gateway` error carrying the status
/// and the collaborator's `error` message when it sent one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                body
            }
        });

    Err(Error::Gateway {
        status: status.as_u16(),
        message,
    })
}

/// Keep well-formed `uploaded` records, oldest first.
///
/// A malformed record is skipped with a warning instead of failing the whole
/// list, so one bad row cannot stall every other pending document.
fn pending_documents(raw: Vec<JsonValue>) -> Vec<UploadedDocument> {
    let mut docs: Vec<UploadedDocument> = raw
        .into_iter()
        .filter_map(|value| {
            let id = value.get("id").cloned();
            match serde_json::from_value::<UploadedDocument>(value) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!(file_id = ?id, error = %e, "Skipping malformed pending file record");
                    None
                }
            }
        })
        .filter(|doc| {
            let pending = doc.status == FileStatus::Uploaded;
            if !pending {
                debug!(file_id = %doc.id, status = %doc.status, "Dropping non-pending record");
            }
            pending
        })
        .collect();

    // Stable: equal timestamps keep the collaborator's order.
    docs.sort_by_key(|doc| doc.created_at);
    docs
}

#[async_trait]
impl FileStatusGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn list_pending_files(&self) -> Result<Vec<UploadedDocument>> {
        let url = self.endpoint(&["api", "files", "pending"]);
        let response = self
            .data_call(self.authenticated(self.client.get(url)))
            .send()
            .await?;
        let body: PendingFilesResponse = check_status(response).await?.json().await?;

        let docs = pending_documents(body.files);
        debug!(count = docs.len(), "Fetched pending files");
        Ok(docs)
    }

    #[instrument(skip(self, metadata))]
    async fn set_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        metadata: Option<JsonValue>,
    ) -> Result<()> {
        let url = self.endpoint(&["api", "files", file_id, "status"]);
        let body = json!({
            "status": status,
            "metadata": metadata.unwrap_or_else(|| json!({})),
        });

        let response = self
            .data_call(self.authenticated(self.client.patch(url)))
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;

        debug!(file_id, %status, "Updated file status");
        Ok(())
    }
}

#[async_trait]
impl CaseNoteGateway for HttpGateway {
    #[instrument(skip(self, note))]
    async fn create_case_note(&self, patient_id: &str, note: &NewCaseNote) -> Result<CaseNote> {
        let url = self.endpoint(&["api", "notes", "patient", patient_id]);
        let response = self
            .data_call(self.authenticated(self.client.post(url)))
            .json(note)
            .send()
            .await?;
        let body: CreatedNoteResponse = check_status(response).await?.json().await?;

        debug!(patient_id, note_id = %body.case_note.id, "Created case note");
        Ok(body.case_note)
    }
}

#[async_trait]
impl SystemGateway for HttpGateway {
    async fn health_check(&self) -> Result<bool> {
        let url = self.endpoint(&["health"]);
        let response = self
            .client
            .get(url)
            .timeout(self.config.short_timeout())
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn cleanup(&self) -> Result<String> {
        let url = self.endpoint(&["api", "cleanup"]);
        let response = self
            .data_call(self.authenticated(self.client.post(url)))
            .json(&json!({}))
            .send()
            .await?;
        let body: CleanupResponse = check_status(response).await?.json().await?;
        Ok(body.message.unwrap_or_default())
    }

    async fn seed_admin(&self) -> Result<AdminAccount> {
        // Seeding precedes any credential the service may issue, so it is unauthenticated.
        let url = self.endpoint(&["api", "auth", "seed"]);
        let response = self
            .data_call(self.client.post(url))
            .json(&json!({}))
            .send()
            .await?;
        let account: AdminAccount = check_status(response).await?.json().await?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, created_at: &str, status: &str) -> JsonValue {
        json!({
            "id": id,
            "patientId": "p1",
            "originalName": "scan.png",
            "fileName": format!("{}.png", id),
            "filePath": format!("/uploads/{}.png", id),
            "fileType": ".png",
            "mimeType": "image/png",
            "size": 10,
            "status": status,
            "metadata": null,
            "createdAt": created_at,
            "updatedAt": created_at
        })
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let gateway = HttpGateway::new(
            GatewayConfig::default().with_base_url("http://localhost:3001/backend/"),
        )
        .unwrap();
        let url = gateway.endpoint(&["api", "files", "a b/c", "status"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:3001/backend/api/files/a%20b%2Fc/status"
        );
    }

    #[test]
    fn test_endpoint_without_path() {
        let gateway = HttpGateway::new(GatewayConfig::default()).unwrap();
        assert_eq!(
            gateway.endpoint(&["health"]).as_str(),
            "http://localhost:3001/health"
        );
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = HttpGateway::new(GatewayConfig::default().with_base_url("ftp://x"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_pending_documents_sorted_oldest_first() {
        let docs = pending_documents(vec![
            record("b", "2026-01-02T10:00:00Z", "uploaded"),
            record("a", "2026-01-01T10:00:00Z", "uploaded"),
            record("c", "2026-01-03T10:00:00Z", "uploaded"),
        ]);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_pending_documents_stable_for_equal_timestamps() {
        let docs = pending_documents(vec![
            record("second", "2026-01-01T10:00:00Z", "uploaded"),
            record("first", "2026-01-01T10:00:00Z", "uploaded"),
        ]);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn test_pending_documents_drops_non_pending_and_malformed() {
        let docs = pending_documents(vec![
            record("ok", "2026-01-01T10:00:00Z", "uploaded"),
            record("busy", "2026-01-01T10:00:00Z", "processing"),
            json!({"id": "broken"}),
        ]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "ok");
    }
}
