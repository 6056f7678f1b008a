use async_trait::async_trait;
use profilehub_core::{ProfileHubError, ProfileHubResult};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

/// An uploaded document on its way to text extraction.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original file name, used for the multipart part.
    pub file_name: String,
    /// MIME type as sent by the client.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Turns a binary document into text (and whatever else the service reports).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Submit a document. The returned object is merged into the upload
    /// response.
    async fn extract(&self, document: Document) -> ProfileHubResult<Map<String, Value>>;
}

/// Forwards documents as `multipart/form-data` (field `file`) to an
/// extraction webhook.
pub struct HttpTextExtractor {
    url: String,
    http: reqwest::Client,
}

impl HttpTextExtractor {
    /// Extractor posting to the webhook at `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> ProfileHubResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProfileHubError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, document: Document) -> ProfileHubResult<Map<String, Value>> {
        let size = document.bytes.len();
        let part = reqwest::multipart::Part::bytes(document.bytes).file_name(document.file_name);
        let part = match document.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => part.mime_str(ct).map_err(|e| {
                ProfileHubError::Validation(format!("Invalid content type '{ct}': {e}"))
            })?,
            _ => part,
        };
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProfileHubError::Timeout(format!("Extraction service timed out: {e}"))
                } else {
                    ProfileHubError::Http(format!("Extraction request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Extraction service rejected document");
            return Err(ProfileHubError::Upstream {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        info!(bytes = size, "Document forwarded to extraction service");
        // A success without a JSON object body still counts as accepted.
        match resp.json::<Value>().await {
            Ok(Value::Object(map)) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}
