use async_trait::async_trait;
use profilehub_core::{ProfileHubError, ProfileHubResult};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Public object storage for avatar images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `name`. Existing objects are never overwritten.
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> ProfileHubResult<()>;

    /// Publicly addressable URL of a stored object.
    fn public_url(&self, name: &str) -> String;
}

/// Supabase Storage bucket, written with the service-role key.
pub struct SupabaseStorage {
    base_url: String,
    service_key: String,
    bucket: String,
    http: reqwest::Client,
}

impl SupabaseStorage {
    /// Client for `bucket` in the Supabase project at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> ProfileHubResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProfileHubError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
            http,
        })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> ProfileHubResult<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, name
        );
        let size = bytes.len();
        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProfileHubError::Storage(format!("Upload request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProfileHubError::Storage(format!(
                "Upload failed {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        info!(bucket = %self.bucket, object = %name, bytes = size, "Stored object");
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, name
        )
    }
}

/// Process-local storage. Serves tests and file-backed development setups.
pub struct InMemoryStorage {
    base_url: String,
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl InMemoryStorage {
    /// Empty store whose public URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Content type and bytes of a stored object.
    pub async fn get(&self, name: &str) -> Option<(String, Vec<u8>)> {
        self.objects.read().await.get(name).cloned()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// No object stored yet.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> ProfileHubResult<()> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(name) {
            return Err(ProfileHubError::Storage(format!(
                "Object already exists: {name}"
            )));
        }
        objects.insert(name.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}
