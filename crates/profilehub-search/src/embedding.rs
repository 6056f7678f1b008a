use async_trait::async_trait;
use profilehub_core::{ProfileHubError, ProfileHubResult};
use std::time::Duration;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> ProfileHubResult<Vec<f32>>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// OpenAI-compatible `/v1/embeddings` client.
pub struct OpenAiEmbedding {
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    http: reqwest::Client,
}

impl OpenAiEmbedding {
    /// Public OpenAI API.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    /// Model used when none is configured.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";
    /// Output length of [`Self::DEFAULT_MODEL`].
    pub const DEFAULT_DIMENSION: usize = 1536;

    /// Client with the default endpoint and model, bounded by `timeout`.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ProfileHubResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProfileHubError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            dimension: Self::DEFAULT_DIMENSION,
            http,
        })
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use another model; `dimension` must match its output.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> ProfileHubResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ProfileHubError::Embedding(
                "Cannot embed empty text".to_string(),
            ));
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProfileHubError::Timeout(format!("embedding request timed out: {e}"))
                } else {
                    ProfileHubError::Embedding(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProfileHubError::Embedding(format!(
                "OpenAI API error {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProfileHubError::Embedding(e.to_string()))?;
        parse_embedding_response(&resp_body)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Extract `data[0].embedding` from an embeddings response.
fn parse_embedding_response(body: &serde_json::Value) -> ProfileHubResult<Vec<f32>> {
    let values = body["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| ProfileHubError::Embedding("Response has no embedding".to_string()))?;

    let vector = values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| ProfileHubError::Embedding("Non-numeric embedding value".to_string()))?;

    if vector.is_empty() {
        return Err(ProfileHubError::Embedding("Empty embedding".to_string()));
    }
    Ok(vector)
}
