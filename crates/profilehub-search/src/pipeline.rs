use crate::compose::compose;
use crate::embedding::EmbeddingProvider;
use crate::facets::extract_facets;
use crate::fallback::KeywordFallback;
use crate::vector::{VectorOutcome, VectorRetriever};
use profilehub_core::{Profile, ProfileHubError, ProfileHubResult};
use profilehub_store::ProfileStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Tunable constants of the search pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPolicy {
    /// Minimum cosine similarity for the stored similarity procedure.
    pub similarity_threshold: f32,
    /// Maximum results of a natural-language search.
    pub natural_result_cap: usize,
    /// Profiles fetched for the local similarity scan.
    pub candidate_pool: usize,
    /// Score given to structured fallback hits.
    pub structured_score: u32,
    /// Score given to substring fallback hits.
    pub keyword_score: u32,
    /// Substring fallback uses at most this many query tokens.
    pub keyword_token_limit: usize,
    /// Shorter tokens are ignored by the substring fallback.
    pub keyword_min_chars: usize,
    /// Maximum results of a structured filter search.
    pub filter_result_cap: usize,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            natural_result_cap: 20,
            candidate_pool: 100,
            structured_score: 85,
            keyword_score: 80,
            keyword_token_limit: 3,
            keyword_min_chars: 2,
            filter_result_cap: 50,
        }
    }
}

/// Response of a natural-language search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// Ranked profiles, embeddings stripped.
    pub results: Vec<Profile>,
    /// `results.len()`.
    pub count: usize,
    /// The vector path was unavailable and the keyword fallback answered.
    pub used_keyword_fallback: bool,
}

impl SearchOutcome {
    fn new(results: Vec<Profile>, used_keyword_fallback: bool) -> Self {
        Self {
            count: results.len(),
            results,
            used_keyword_fallback,
        }
    }
}

/// The natural-language search pipeline: facet extraction, vector
/// retrieval, keyword fallback, and result composition.
///
/// Stateless between calls; safe to share behind an `Arc`.
pub struct NaturalSearch {
    store: Arc<dyn ProfileStore>,
    vector: VectorRetriever,
    fallback: KeywordFallback,
    policy: SearchPolicy,
    deadline: Option<Duration>,
}

impl NaturalSearch {
    /// `provider` is `None` when no embedding credential is configured.
    pub fn new(
        store: Arc<dyn ProfileStore>,
        provider: Option<Arc<dyn EmbeddingProvider>>,
        policy: SearchPolicy,
    ) -> Self {
        Self {
            store,
            vector: VectorRetriever::new(provider, policy.clone()),
            fallback: KeywordFallback::new(policy.clone()),
            policy,
            deadline: None,
        }
    }

    /// Bound every search by a single overall deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Constants this pipeline runs with.
    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Run a natural-language search.
    ///
    /// A blank query is rejected before any I/O. Datastore failures abort
    /// the search; embedding failures only route to the fallback.
    pub async fn search(&self, query: &str) -> ProfileHubResult<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ProfileHubError::Validation(
                "search query must not be empty".to_string(),
            ));
        }

        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run(query))
                .await
                .map_err(|_| {
                    ProfileHubError::Timeout(format!(
                        "search did not finish within {}s",
                        deadline.as_secs_f32()
                    ))
                })?,
            None => self.run(query).await,
        }
    }

    async fn run(&self, query: &str) -> ProfileHubResult<SearchOutcome> {
        let facets = extract_facets(query);
        debug!(facets = ?facets, "Extracted facets");
        let cap = self.policy.natural_result_cap;

        let outcome = match self.vector.retrieve(self.store.as_ref(), query).await? {
            VectorOutcome::Found { candidates, .. } => {
                SearchOutcome::new(compose(candidates, &facets, cap), false)
            }
            VectorOutcome::Unavailable(reason) => {
                info!(reason = ?reason, "Vector search unavailable, using keyword fallback");
                let hits = self
                    .fallback
                    .retrieve(self.store.as_ref(), query, &facets)
                    .await?;
                SearchOutcome::new(compose(hits, &facets, cap), true)
            }
        };

        info!(
            count = outcome.count,
            used_keyword_fallback = outcome.used_keyword_fallback,
            "Natural search complete"
        );
        Ok(outcome)
    }
}
