//! `profilehub.toml` and environment secrets.

use profilehub_search::{OpenAiEmbedding, SearchPolicy};
use profilehub_security::{ApiKeyEntry, RateLimits};
use profilehub_store::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProfileHubConfig {
    pub server: ServerConfig,
    pub datastore: DatastoreConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchPolicy,
    pub security: SecurityConfig,
    pub integrations: IntegrationsConfig,
}

impl ProfileHubConfig {
    /// Read and parse the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&config_str)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Overall deadline of one natural-language search.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreKind {
    Postgrest,
    #[default]
    File,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    pub kind: DatastoreKind,
    /// Supabase project URL, for `kind = "postgrest"`.
    pub url: Option<String>,
    /// Snapshot file, for `kind = "file"`.
    pub path: PathBuf,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            kind: DatastoreKind::default(),
            url: None,
            path: PathBuf::from("./data/profiles.json"),
            timeout_secs: 5,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: OpenAiEmbedding::DEFAULT_BASE_URL.to_string(),
            model: OpenAiEmbedding::DEFAULT_MODEL.to_string(),
            dimension: OpenAiEmbedding::DEFAULT_DIMENSION,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Tokens restored per second in every rate-limit bucket.
    pub max_requests_per_second: f64,
    /// Bucket capacity per API key.
    pub max_burst: f64,
    /// Capacity of the bucket shared by callers without a key.
    pub anonymous_burst: f64,
    /// Longest accepted search query, in characters.
    pub max_query_length: usize,
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: 10.0,
            max_burst: 50.0,
            anonymous_burst: 10.0,
            max_query_length: 500,
            api_keys: vec![],
        }
    }
}

impl SecurityConfig {
    /// Rate-limit budget for the gateway.
    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            requests_per_second: self.max_requests_per_second,
            burst: self.max_burst,
            anonymous_burst: self.anonymous_burst,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Document-to-text webhook. `N8N_WEBHOOK_URL` takes precedence.
    pub extraction_url: Option<String>,
    /// Supabase URL for avatar storage; defaults to the datastore URL.
    pub storage_url: Option<String>,
    pub avatar_bucket: String,
    pub timeout_secs: u64,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            extraction_url: None,
            storage_url: None,
            avatar_bucket: "avatars".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Credentials taken from the environment (and `.env`), never from the config file.
#[derive(Debug, Default, Clone)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub service_role_key: Option<String>,
    pub anon_key: Option<String>,
    pub extraction_url: Option<String>,
    pub avatar_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            anon_key: get("SUPABASE_ANON_KEY"),
            extraction_url: get("N8N_WEBHOOK_URL"),
            avatar_secret: get("N8N_AVATAR_UPLOAD_SECRET"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use profilehub_security::Role;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ProfileHubConfig::parse("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.datastore.kind, DatastoreKind::File);
        assert_eq!(config.datastore.timeout_secs, 5);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.embedding.timeout_secs, 10);
        assert_eq!(config.search.natural_result_cap, 20);
        assert_eq!(config.search.filter_result_cap, 50);
        assert_eq!(config.integrations.avatar_bucket, "avatars");
        assert!(config.security.api_keys.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = ProfileHubConfig::parse(
            r#"
            [server]
            port = 8080

            [datastore]
            kind = "postgrest"
            url = "https://abc.supabase.co"

            [datastore.retry]
            max_retries = 1

            [search]
            similarity_threshold = 0.7
            keyword_score = 75

            [security]
            anonymous_burst = 3
            max_query_length = 200
            api_keys = [
                { key = "a", role = "admin" },
                { key = "v", role = "viewer" },
            ]

            [integrations]
            extraction_url = "http://localhost:5678/webhook/resume"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.datastore.kind, DatastoreKind::Postgrest);
        assert_eq!(config.datastore.retry.max_retries, 1);
        assert_eq!(config.datastore.retry.backoff_base_ms, 500);
        assert!((config.search.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.search.keyword_score, 75);
        assert_eq!(config.search.structured_score, 85);
        assert_eq!(config.security.max_query_length, 200);
        let limits = config.security.rate_limits();
        assert!((limits.anonymous_burst - 3.0).abs() < f64::EPSILON);
        assert!((limits.burst - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.security.api_keys[1].role, Role::Viewer);
    }

    #[test]
    fn test_unknown_datastore_kind_rejected() {
        assert!(ProfileHubConfig::parse("[datastore]\nkind = \"mongo\"").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ProfileHubConfig::load(&tmp.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_secrets_blank_is_unset() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "  "),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("N8N_WEBHOOK_URL", "http://n8n/webhook"),
        ]
        .into_iter()
        .collect();
        let secrets = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(secrets.openai_api_key.is_none());
        assert_eq!(secrets.service_role_key.as_deref(), Some("service"));
        assert!(secrets.anon_key.is_none());
        assert_eq!(secrets.extraction_url.as_deref(), Some("http://n8n/webhook"));
    }
}
