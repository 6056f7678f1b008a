use crate::{cosine_similarity, AccessMode, ProfileQuery, ProfileStore, SimilarProfile};
use async_trait::async_trait;
use profilehub_core::{
    CapabilityScores, EmploymentHistory, Profile, ProfileDetail, ProfileHubError,
    ProfileHubResult, ProjectCareer,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Full contents of a store: the aggregate roots and everything they own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Profile rows.
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Employment rows of every profile.
    #[serde(default)]
    pub employment_history: Vec<EmploymentHistory>,
    /// Project rows of every profile.
    #[serde(default)]
    pub project_careers: Vec<ProjectCareer>,
    /// At most one row per profile.
    #[serde(default)]
    pub capabilities: Vec<CapabilityScores>,
}

/// In-memory profile store with brute-force query evaluation.
/// Suitable for tests, local development, and small catalogs.
pub struct InMemoryProfileStore {
    state: RwLock<Snapshot>,
    similarity_procedure: bool,
    access_mode: AccessMode,
    reads: AtomicUsize,
}

impl InMemoryProfileStore {
    /// Empty store with the similarity procedure available.
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    /// Store holding the rows of `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            similarity_procedure: true,
            access_mode: AccessMode::Privileged,
            reads: AtomicUsize::new(0),
        }
    }

    /// Behave like a datastore where the similarity procedure is not
    /// installed: `match_profiles` always errors.
    pub fn without_similarity_procedure(mut self) -> Self {
        self.similarity_procedure = false;
        self
    }

    /// Report `mode` from [`ProfileStore::access_mode`].
    pub fn with_access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = mode;
        self
    }

    /// Clone of the current contents.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    /// Number of read round trips served so far (queries, similarity
    /// searches, lookups, counts).
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    async fn query(&self, query: &ProfileQuery) -> ProfileHubResult<Vec<Profile>> {
        self.record_read();
        let state = self.state.read().await;

        let mut rows: Vec<Profile> = state
            .profiles
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();

        if query.is_newest_first() {
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        if let Some(limit) = query.limit_value() {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn match_profiles(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> ProfileHubResult<Vec<SimilarProfile>> {
        self.record_read();
        if !self.similarity_procedure {
            return Err(ProfileHubError::Datastore(
                "similarity procedure match_profiles is not installed".to_string(),
            ));
        }
        if query_embedding.is_empty() {
            return Err(ProfileHubError::Datastore("Empty query embedding".to_string()));
        }

        let state = self.state.read().await;
        let mut scored: Vec<SimilarProfile> = state
            .profiles
            .iter()
            .filter_map(|p| {
                let embedding = p.embedding.as_ref()?;
                if embedding.len() != query_embedding.len() {
                    return None;
                }
                let similarity = cosine_similarity(query_embedding, embedding);
                (similarity >= threshold).then(|| SimilarProfile {
                    profile: p.clone(),
                    similarity,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(count);
        Ok(scored)
    }

    async fn get(&self, id: Uuid) -> ProfileHubResult<Option<Profile>> {
        self.record_read();
        let state = self.state.read().await;
        Ok(state.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn detail(&self, id: Uuid) -> ProfileHubResult<Option<ProfileDetail>> {
        self.record_read();
        let state = self.state.read().await;
        let Some(profile) = state.profiles.iter().find(|p| p.id == id).cloned() else {
            return Ok(None);
        };

        Ok(Some(ProfileDetail {
            employment_history: state
                .employment_history
                .iter()
                .filter(|e| e.profile_id == id)
                .cloned()
                .collect(),
            project_careers: state
                .project_careers
                .iter()
                .filter(|p| p.profile_id == id)
                .cloned()
                .collect(),
            capabilities: state
                .capabilities
                .iter()
                .find(|c| c.profile_id == id)
                .copied(),
            profile,
        }))
    }

    async fn insert(&self, profile: Profile) -> ProfileHubResult<Profile> {
        let mut state = self.state.write().await;
        if state.profiles.iter().any(|p| p.id == profile.id) {
            return Err(ProfileHubError::Conflict(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        if state.profiles.iter().any(|p| p.email == profile.email) {
            return Err(ProfileHubError::Conflict(format!(
                "email '{}' is already registered",
                profile.email
            )));
        }
        state.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update(&self, profile: Profile) -> ProfileHubResult<Profile> {
        let mut state = self.state.write().await;
        if state
            .profiles
            .iter()
            .any(|p| p.id != profile.id && p.email == profile.email)
        {
            return Err(ProfileHubError::Conflict(format!(
                "email '{}' is already registered",
                profile.email
            )));
        }
        let slot = state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| ProfileHubError::NotFound(format!("profile {}", profile.id)))?;
        *slot = profile.clone();
        Ok(profile)
    }

    async fn delete(&self, id: Uuid) -> ProfileHubResult<bool> {
        let mut state = self.state.write().await;
        let before = state.profiles.len();
        state.profiles.retain(|p| p.id != id);
        if state.profiles.len() == before {
            return Ok(false);
        }
        state.employment_history.retain(|e| e.profile_id != id);
        state.project_careers.retain(|p| p.profile_id != id);
        state.capabilities.retain(|c| c.profile_id != id);
        Ok(true)
    }

    async fn replace_children(
        &self,
        profile_id: Uuid,
        employment_history: Vec<String>,
        project_careers: Vec<String>,
    ) -> ProfileHubResult<()> {
        // One write guard covers delete and insert, so readers never see a
        // half-replaced list.
        let mut state = self.state.write().await;
        if !state.profiles.iter().any(|p| p.id == profile_id) {
            return Err(ProfileHubError::NotFound(format!("profile {profile_id}")));
        }

        state.employment_history.retain(|e| e.profile_id != profile_id);
        state.project_careers.retain(|p| p.profile_id != profile_id);
        state.employment_history.extend(
            employment_history
                .into_iter()
                .map(|company| EmploymentHistory::new(profile_id, company)),
        );
        state.project_careers.extend(
            project_careers
                .into_iter()
                .map(|project| ProjectCareer::new(profile_id, project)),
        );
        Ok(())
    }

    async fn upsert_capabilities(&self, scores: CapabilityScores) -> ProfileHubResult<()> {
        let mut state = self.state.write().await;
        if !state.profiles.iter().any(|p| p.id == scores.profile_id) {
            return Err(ProfileHubError::NotFound(format!(
                "profile {}",
                scores.profile_id
            )));
        }
        state.capabilities.retain(|c| c.profile_id != scores.profile_id);
        state.capabilities.push(scores);
        Ok(())
    }

    async fn count(&self) -> ProfileHubResult<usize> {
        self.record_read();
        let state = self.state.read().await;
        Ok(state.profiles.len())
    }
}
