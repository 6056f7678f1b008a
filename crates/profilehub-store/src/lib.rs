//! Profile datastore abstraction.
//!
//! The search pipeline and the admin console talk to the relational store
//! only through the [`ProfileStore`] trait, a narrow "query executor" that
//! knows equality, array-containment, array-overlap, substring, and
//! result-limit filters plus an optional stored similarity procedure.
//!
//! # Main types
//!
//! - [`ProfileStore`]: Trait implemented by every backend.
//! - [`ProfileQuery`]: Fluent read-query builder.
//! - [`InMemoryProfileStore`]: Process-local backend, used in tests and by the file store.
//! - [`FileProfileStore`]: JSON-snapshot backend for local development.
//! - [`PostgrestStore`]: Supabase/PostgREST backend with privileged or ambient access.
//! - [`RetryingStore`]: Decorator retrying transient read failures.

/// JSON-snapshot backed store.
pub mod file;
/// Process-local store.
pub mod memory;
/// Supabase/PostgREST store.
pub mod postgrest;
/// Read-query model.
pub mod query;
/// Retry decorator with exponential backoff.
pub mod retry;

pub use file::FileProfileStore;
pub use memory::{InMemoryProfileStore, Snapshot};
pub use postgrest::PostgrestStore;
pub use query::{ArrayColumn, Column, Filter, ProfileQuery, TextColumn};
pub use retry::{RetryPolicy, RetryingStore};

use async_trait::async_trait;
use profilehub_core::{CapabilityScores, Profile, ProfileDetail, ProfileHubResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the store authenticates against the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Bypasses per-row visibility rules (service credential).
    Privileged,
    /// Subject to per-row visibility rules (anonymous or session credential).
    Ambient,
}

/// A profile returned by a similarity search, with its cosine similarity.
#[derive(Debug, Clone)]
pub struct SimilarProfile {
    /// The matched row.
    pub profile: Profile,
    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Query executor over the profile aggregate.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Whether this store sees every row or only what row-level rules allow.
    fn access_mode(&self) -> AccessMode;

    /// Run a filtered read against the profile table.
    async fn query(&self, query: &ProfileQuery) -> ProfileHubResult<Vec<Profile>>;

    /// Invoke the stored similarity procedure. Returns rows with
    /// `similarity >= threshold`, best first, at most `count` of them.
    ///
    /// An error here means the procedure is missing or failed; callers may
    /// fall back to computing similarity themselves.
    async fn match_profiles(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> ProfileHubResult<Vec<SimilarProfile>>;

    /// Fetch one profile.
    async fn get(&self, id: Uuid) -> ProfileHubResult<Option<Profile>>;

    /// Fetch one profile with employment history, project careers, and
    /// capability scores.
    async fn detail(&self, id: Uuid) -> ProfileHubResult<Option<ProfileDetail>>;

    /// Look a profile up by its unique email.
    async fn find_by_email(&self, email: &str) -> ProfileHubResult<Option<Profile>> {
        let rows = self
            .query(&ProfileQuery::new().eq(Column::Email, email).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a new profile. Duplicate email is a `Conflict`.
    async fn insert(&self, profile: Profile) -> ProfileHubResult<Profile>;

    /// Replace an existing profile row. Missing id is `NotFound`, duplicate
    /// email is a `Conflict`.
    async fn update(&self, profile: Profile) -> ProfileHubResult<Profile>;

    /// Delete a profile and everything it owns. Returns `false` if absent.
    async fn delete(&self, id: Uuid) -> ProfileHubResult<bool>;

    /// Replace the employment history and project careers of a profile
    /// with the given lists (delete-then-insert).
    async fn replace_children(
        &self,
        profile_id: Uuid,
        employment_history: Vec<String>,
        project_careers: Vec<String>,
    ) -> ProfileHubResult<()>;

    /// Write capability scores. Normally owned by the external analysis
    /// process; exposed for seeding.
    async fn upsert_capabilities(&self, scores: CapabilityScores) -> ProfileHubResult<()>;

    /// Total number of profiles.
    async fn count(&self) -> ProfileHubResult<usize>;
}

/// Cosine similarity between two vectors.
///
/// Mismatched lengths and zero-norm inputs yield `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }
}
