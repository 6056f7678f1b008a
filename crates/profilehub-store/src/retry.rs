use crate::{AccessMode, ProfileQuery, ProfileStore, SimilarProfile};
use async_trait::async_trait;
use profilehub_core::{CapabilityScores, Profile, ProfileDetail, ProfileHubResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Retry behaviour for transient datastore read failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Exponential backoff for the given attempt, capped at `backoff_max_ms`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A [`ProfileStore`] decorator that retries reads on transient errors.
///
/// Writes are forwarded once; replaying a write that may have reached the
/// datastore is not safe without idempotency keys.
pub struct RetryingStore {
    inner: Arc<dyn ProfileStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    /// Wrap `inner`, retrying its reads per `policy`.
    pub fn new(inner: Arc<dyn ProfileStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> ProfileHubResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ProfileHubResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = compute_backoff(&self.policy, attempt);
                    info!(
                        operation,
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "Transient datastore error, backing off"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            operation,
                            attempts = attempt + 1,
                            error = %e,
                            "Datastore retries exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl ProfileStore for RetryingStore {
    fn access_mode(&self) -> AccessMode {
        self.inner.access_mode()
    }

    async fn query(&self, query: &ProfileQuery) -> ProfileHubResult<Vec<Profile>> {
        self.with_retry("query", move || self.inner.query(query)).await
    }

    async fn match_profiles(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> ProfileHubResult<Vec<SimilarProfile>> {
        self.with_retry("match_profiles", move || {
            self.inner.match_profiles(query_embedding, threshold, count)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> ProfileHubResult<Option<Profile>> {
        self.with_retry("get", move || self.inner.get(id)).await
    }

    async fn detail(&self, id: Uuid) -> ProfileHubResult<Option<ProfileDetail>> {
        self.with_retry("detail", move || self.inner.detail(id)).await
    }

    async fn find_by_email(&self, email: &str) -> ProfileHubResult<Option<Profile>> {
        self.with_retry("find_by_email", move || self.inner.find_by_email(email))
            .await
    }

    async fn insert(&self, profile: Profile) -> ProfileHubResult<Profile> {
        self.inner.insert(profile).await
    }

    async fn update(&self, profile: Profile) -> ProfileHubResult<Profile> {
        self.inner.update(profile).await
    }

    async fn delete(&self, id: Uuid) -> ProfileHubResult<bool> {
        self.inner.delete(id).await
    }

    async fn replace_children(
        &self,
        profile_id: Uuid,
        employment_history: Vec<String>,
        project_careers: Vec<String>,
    ) -> ProfileHubResult<()> {
        self.inner
            .replace_children(profile_id, employment_history, project_careers)
            .await
    }

    async fn upsert_capabilities(&self, scores: CapabilityScores) -> ProfileHubResult<()> {
        self.inner.upsert_capabilities(scores).await
    }

    async fn count(&self) -> ProfileHubResult<usize> {
        self.with_retry("count", move || self.inner.count()).await
    }
}

impl std::fmt::Debug for RetryingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::InMemoryProfileStore;
    use profilehub_core::ProfileHubError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ProfileHubError {
        ProfileHubError::Timeout("simulated".into())
    }

    /// Fails the first `failures` reads with the given error, then delegates.
    struct Flaky {
        inner: InMemoryProfileStore,
        failures: AtomicU32,
        error: fn() -> ProfileHubError,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: fn() -> ProfileHubError) -> Self {
            Self {
                inner: InMemoryProfileStore::new(),
                failures: AtomicU32::new(failures),
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn trip(&self) -> ProfileHubResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err((self.error)());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ProfileStore for Flaky {
        fn access_mode(&self) -> AccessMode {
            AccessMode::Privileged
        }
        async fn query(&self, query: &ProfileQuery) -> ProfileHubResult<Vec<Profile>> {
            self.trip()?;
            self.inner.query(query).await
        }
        async fn match_profiles(
            &self,
            e: &[f32],
            t: f32,
            c: usize,
        ) -> ProfileHubResult<Vec<SimilarProfile>> {
            self.trip()?;
            self.inner.match_profiles(e, t, c).await
        }
        async fn get(&self, id: Uuid) -> ProfileHubResult<Option<Profile>> {
            self.inner.get(id).await
        }
        async fn detail(&self, id: Uuid) -> ProfileHubResult<Option<ProfileDetail>> {
            self.inner.detail(id).await
        }
        async fn insert(&self, p: Profile) -> ProfileHubResult<Profile> {
            self.trip()?;
            self.inner.insert(p).await
        }
        async fn update(&self, p: Profile) -> ProfileHubResult<Profile> {
            self.inner.update(p).await
        }
        async fn delete(&self, id: Uuid) -> ProfileHubResult<bool> {
            self.inner.delete(id).await
        }
        async fn replace_children(
            &self,
            id: Uuid,
            a: Vec<String>,
            b: Vec<String>,
        ) -> ProfileHubResult<()> {
            self.inner.replace_children(id, a, b).await
        }
        async fn upsert_capabilities(&self, s: CapabilityScores) -> ProfileHubResult<()> {
            self.inner.upsert_capabilities(s).await
        }
        async fn count(&self) -> ProfileHubResult<usize> {
            self.trip()?;
            self.inner.count().await
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        }
    }

    #[test]
    fn test_compute_backoff_exponential() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_base_ms: 100,
            backoff_max_ms: 10_000,
        };
        assert_eq!(compute_backoff(&policy, 0), 100);
        assert_eq!(compute_backoff(&policy, 1), 200);
        assert_eq!(compute_backoff(&policy, 2), 400);
        assert_eq!(compute_backoff(&policy, 3), 800);
    }

    #[test]
    fn test_compute_backoff_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_base_ms: 1000,
            backoff_max_ms: 5000,
        };
        assert_eq!(compute_backoff(&policy, 3), 5000);
        assert_eq!(compute_backoff(&policy, 63), 5000);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_base_ms, 500);
        assert_eq!(policy.backoff_max_ms, 30_000);
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[tokio::test]
    async fn test_read_retried_until_success() {
        let flaky = Arc::new(Flaky::new(2, transient));
        let store = RetryingStore::new(flaky.clone(), fast_policy(3));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_gives_up_after_max_retries() {
        let flaky = Arc::new(Flaky::new(10, transient));
        let store = RetryingStore::new(flaky.clone(), fast_policy(2));
        assert!(matches!(
            store.query(&ProfileQuery::new()).await,
            Err(ProfileHubError::Timeout(_))
        ));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let flaky = Arc::new(Flaky::new(1, || {
            ProfileHubError::Datastore("PostgREST error 400: bad filter".into())
        }));
        let store = RetryingStore::new(flaky.clone(), fast_policy(3));
        assert!(store.count().await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_writes_not_retried() {
        let flaky = Arc::new(Flaky::new(1, transient));
        let store = RetryingStore::new(flaky.clone(), fast_policy(3));
        let profile = Profile::new(profilehub_core::ProfileInput {
            name: "a".into(),
            email: "a@x.com".into(),
            ..Default::default()
        });
        assert!(store.insert(profile).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
