//! Wiring: turns config and secrets into stores, clients, and gateway state.

use crate::config::{DatastoreKind, ProfileHubConfig, Secrets};
use anyhow::Context;
use profilehub_core::{CapabilityScores, Profile, ProfileInput};
use profilehub_gateway::{AppState, HttpTextExtractor, ObjectStorage, SupabaseStorage};
use profilehub_search::{EmbeddingProvider, FilterSearch, NaturalSearch, OpenAiEmbedding};
use profilehub_security::Sanitizer;
use profilehub_store::{FileProfileStore, PostgrestStore, ProfileStore, RetryingStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Open the configured datastore.
///
/// PostgREST uses the service-role key when present (privileged) and the
/// anon key otherwise (ambient). Reads are retried per `[datastore.retry]`.
pub async fn build_store(
    config: &ProfileHubConfig,
    secrets: &Secrets,
) -> anyhow::Result<Arc<dyn ProfileStore>> {
    let store: Arc<dyn ProfileStore> = match config.datastore.kind {
        DatastoreKind::File => {
            let store = FileProfileStore::new(config.datastore.path.clone()).await?;
            info!(path = %store.path().display(), "Using file profile store");
            Arc::new(store)
        }
        DatastoreKind::Postgrest => {
            let url = config
                .datastore
                .url
                .clone()
                .context("[datastore] url is required for kind = \"postgrest\"")?;
            let timeout = Duration::from_secs(config.datastore.timeout_secs);
            let store = match (&secrets.service_role_key, &secrets.anon_key) {
                (Some(service), _) => PostgrestStore::privileged(url, service.clone(), timeout)?,
                (None, Some(anon)) => {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, row-level security applies");
                    PostgrestStore::ambient(url, anon.clone(), None, timeout)?
                }
                (None, None) => anyhow::bail!(
                    "SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY is required for the PostgREST store"
                ),
            };
            info!(mode = ?store.access_mode(), "Using PostgREST profile store");
            Arc::new(store)
        }
    };
    Ok(Arc::new(RetryingStore::new(
        store,
        config.datastore.retry.clone(),
    )))
}

/// The embedding provider, or `None` when no credential is configured.
pub fn build_embedding(
    config: &ProfileHubConfig,
    secrets: &Secrets,
) -> anyhow::Result<Option<Arc<dyn EmbeddingProvider>>> {
    let Some(key) = &secrets.openai_api_key else {
        info!("OPENAI_API_KEY not set, natural search uses the keyword fallback");
        return Ok(None);
    };
    let provider = OpenAiEmbedding::new(
        key.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    )?
    .with_base_url(config.embedding.base_url.clone())
    .with_model(config.embedding.model.clone(), config.embedding.dimension);
    Ok(Some(Arc::new(provider)))
}

pub fn build_natural_search(
    config: &ProfileHubConfig,
    store: Arc<dyn ProfileStore>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
) -> NaturalSearch {
    NaturalSearch::new(store, provider, config.search.clone())
        .with_deadline(Duration::from_secs(config.server.request_timeout_secs))
}

/// Gateway state with every optional collaborator that is configured.
pub fn build_state(
    config: &ProfileHubConfig,
    secrets: &Secrets,
    store: Arc<dyn ProfileStore>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
) -> anyhow::Result<AppState> {
    let natural = build_natural_search(config, store.clone(), provider);
    let filter = FilterSearch::new(store.clone(), config.search.filter_result_cap);
    let mut state = AppState::new(store, natural, filter)
        .with_sanitizer(Sanitizer::new(config.security.max_query_length));

    let timeout = Duration::from_secs(config.integrations.timeout_secs);
    let extraction_url = secrets
        .extraction_url
        .clone()
        .or_else(|| config.integrations.extraction_url.clone());
    match extraction_url {
        Some(url) => {
            state = state.with_extractor(Arc::new(HttpTextExtractor::new(url, timeout)?));
        }
        None => warn!("No extraction service configured, /admin/upload is disabled"),
    }

    let storage_url = config
        .integrations
        .storage_url
        .clone()
        .or_else(|| config.datastore.url.clone());
    match (storage_url, &secrets.service_role_key) {
        (Some(url), Some(key)) => {
            let storage: Arc<dyn ObjectStorage> = Arc::new(SupabaseStorage::new(
                url,
                key.clone(),
                config.integrations.avatar_bucket.clone(),
                timeout,
            )?);
            state = state.with_avatar_storage(storage, secrets.avatar_secret.clone());
        }
        _ => warn!("No avatar storage configured, /uploads/avatar is disabled"),
    }

    Ok(state)
}

/// Capability scores in a seed file; the profile id is assigned on insert.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeedCapabilities {
    pub markup_precision: u8,
    #[serde(alias = "js_ts_logic")]
    pub logic_scripting: u8,
    pub framework_proficiency: u8,
    pub ui_ux_design: u8,
    #[serde(alias = "web_optimization")]
    pub optimization: u8,
    pub accessibility: u8,
}

/// One profile in a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    #[serde(flatten)]
    pub input: ProfileInput,
    #[serde(default)]
    pub capabilities: Option<SeedCapabilities>,
}

/// Outcome of a seed run.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Load profiles from a JSON array. Profiles whose email already exists are
/// skipped, so seeding twice is harmless.
pub async fn seed(store: &dyn ProfileStore, path: &Path) -> anyhow::Result<SeedReport> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;
    let entries: Vec<SeedEntry> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid seed file '{}'", path.display()))?;

    let mut report = SeedReport::default();
    for entry in entries {
        let input = entry.input.normalize()?;
        if store.find_by_email(&input.email).await?.is_some() {
            info!(email = %input.email, "Profile exists, skipping");
            report.skipped += 1;
            continue;
        }

        let employment = input.employment_history.clone();
        let projects = input.project_careers.clone();
        let profile = store.insert(Profile::new(input)).await?;
        store
            .replace_children(profile.id, employment, projects)
            .await?;
        if let Some(c) = entry.capabilities {
            store
                .upsert_capabilities(CapabilityScores {
                    profile_id: profile.id,
                    markup_precision: c.markup_precision,
                    logic_scripting: c.logic_scripting,
                    framework_proficiency: c.framework_proficiency,
                    ui_ux_design: c.ui_ux_design,
                    optimization: c.optimization,
                    accessibility: c.accessibility,
                })
                .await?;
        }
        report.inserted += 1;
    }

    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "Seed complete"
    );
    Ok(report)
}
