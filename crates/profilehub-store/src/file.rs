use crate::memory::{InMemoryProfileStore, Snapshot};
use crate::{AccessMode, ProfileQuery, ProfileStore, SimilarProfile};
use async_trait::async_trait;
use profilehub_core::{CapabilityScores, Profile, ProfileDetail, ProfileHubError, ProfileHubResult};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// JSON-snapshot backed profile store.
///
/// Reads are served from an in-memory copy. Every successful write
/// rewrites the snapshot file through a temporary sibling and a rename.
pub struct FileProfileStore {
    path: PathBuf,
    inner: InMemoryProfileStore,
    write_lock: Mutex<()>,
}

impl FileProfileStore {
    /// Open the store at `path`, loading the snapshot if the file exists.
    pub async fn new(path: PathBuf) -> ProfileHubResult<Self> {
        let snapshot = if path.exists() {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                ProfileHubError::Datastore(format!("Failed to read profile snapshot: {e}"))
            })?;
            if data.trim().is_empty() {
                Snapshot::default()
            } else {
                serde_json::from_str(&data).map_err(|e| {
                    ProfileHubError::Datastore(format!("Invalid profile snapshot: {e}"))
                })?
            }
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ProfileHubError::Datastore(format!("Failed to create dir: {e}"))
                })?;
            }
            Snapshot::default()
        };

        Ok(Self {
            path,
            inner: InMemoryProfileStore::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> ProfileHubResult<()> {
        let snapshot = self.inner.snapshot().await;
        let data = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await.map_err(|e| {
            ProfileHubError::Datastore(format!("Failed to write profile snapshot: {e}"))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ProfileHubError::Datastore(format!("Failed to replace profile snapshot: {e}"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    fn access_mode(&self) -> AccessMode {
        AccessMode::Privileged
    }

    async fn query(&self, query: &ProfileQuery) -> ProfileHubResult<Vec<Profile>> {
        self.inner.query(query).await
    }

    async fn match_profiles(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> ProfileHubResult<Vec<SimilarProfile>> {
        self.inner
            .match_profiles(query_embedding, threshold, count)
            .await
    }

    async fn get(&self, id: Uuid) -> ProfileHubResult<Option<Profile>> {
        self.inner.get(id).await
    }

    async fn detail(&self, id: Uuid) -> ProfileHubResult<Option<ProfileDetail>> {
        self.inner.detail(id).await
    }

    async fn insert(&self, profile: Profile) -> ProfileHubResult<Profile> {
        let _guard = self.write_lock.lock().await;
        let saved = self.inner.insert(profile).await?;
        self.persist().await?;
        Ok(saved)
    }

    async fn update(&self, profile: Profile) -> ProfileHubResult<Profile> {
        let _guard = self.write_lock.lock().await;
        let saved = self.inner.update(profile).await?;
        self.persist().await?;
        Ok(saved)
    }

    async fn delete(&self, id: Uuid) -> ProfileHubResult<bool> {
        let _guard = self.write_lock.lock().await;
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.persist().await?;
        }
        Ok(deleted)
    }

    async fn replace_children(
        &self,
        profile_id: Uuid,
        employment_history: Vec<String>,
        project_careers: Vec<String>,
    ) -> ProfileHubResult<()> {
        let _guard = self.write_lock.lock().await;
        self.inner
            .replace_children(profile_id, employment_history, project_careers)
            .await?;
        self.persist().await
    }

    async fn upsert_capabilities(&self, scores: CapabilityScores) -> ProfileHubResult<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.upsert_capabilities(scores).await?;
        self.persist().await
    }

    async fn count(&self) -> ProfileHubResult<usize> {
        self.inner.count().await
    }
}
