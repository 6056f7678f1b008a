use crate::embedding::EmbeddingProvider;
use crate::pipeline::SearchPolicy;
use profilehub_core::{Profile, ProfileHubResult};
use profilehub_store::{cosine_similarity, ProfileQuery, ProfileStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where vector candidates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSource {
    /// The datastore's stored similarity procedure.
    Procedure,
    /// Similarity computed in process over a bounded candidate pool.
    LocalScan,
}

/// Why the vector path produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// No embedding credential configured.
    NoCredential,
    /// The embedding provider failed.
    Provider(String),
    /// Neither the procedure nor the local scan found a candidate.
    NoResults,
}

/// Result of one vector retrieval.
#[derive(Debug, Clone)]
pub enum VectorOutcome {
    /// Ranked candidates with `match_score` set.
    Found {
        /// Best first, at most the natural-search cap.
        candidates: Vec<Profile>,
        /// Which path produced them.
        source: VectorSource,
    },
    /// The caller should run the keyword fallback.
    Unavailable(Unavailable),
}

/// Map a cosine similarity to an integer score in 0..=100.
pub fn similarity_to_score(similarity: f32) -> u32 {
    if !similarity.is_finite() {
        return 0;
    }
    (similarity * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Similarity search over stored profile embeddings.
pub struct VectorRetriever {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    policy: SearchPolicy,
}

impl VectorRetriever {
    /// `None` means no embedding credential is configured; every retrieval
    /// then reports [`Unavailable::NoCredential`] without any I/O.
    pub fn new(provider: Option<Arc<dyn EmbeddingProvider>>, policy: SearchPolicy) -> Self {
        Self { provider, policy }
    }

    /// An embedding provider is present.
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Embed the query and look for similar profiles.
    ///
    /// Provider failures and an empty result are reported as
    /// [`VectorOutcome::Unavailable`]. A failing similarity procedure is
    /// treated as "no rows" and the local scan runs. Only a failure to fetch
    /// the local candidate pool is an error.
    pub async fn retrieve(
        &self,
        store: &dyn ProfileStore,
        query: &str,
    ) -> ProfileHubResult<VectorOutcome> {
        let Some(provider) = &self.provider else {
            return Ok(VectorOutcome::Unavailable(Unavailable::NoCredential));
        };

        let query_embedding = match provider.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding provider failed, using keyword fallback");
                return Ok(VectorOutcome::Unavailable(Unavailable::Provider(
                    e.to_string(),
                )));
            }
        };

        match store
            .match_profiles(
                &query_embedding,
                self.policy.similarity_threshold,
                self.policy.natural_result_cap,
            )
            .await
        {
            Ok(hits) if !hits.is_empty() => {
                let candidates: Vec<Profile> = hits
                    .into_iter()
                    .take(self.policy.natural_result_cap)
                    .map(|hit| {
                        hit.profile
                            .with_match_score(similarity_to_score(hit.similarity))
                    })
                    .collect();
                info!(
                    source = "procedure",
                    count = candidates.len(),
                    "Vector search found candidates"
                );
                return Ok(VectorOutcome::Found {
                    candidates,
                    source: VectorSource::Procedure,
                });
            }
            Ok(_) => debug!("Similarity procedure returned no rows"),
            Err(e) => debug!(error = %e, "Similarity procedure unavailable, scanning locally"),
        }

        let pool = store
            .query(
                &ProfileQuery::new()
                    .has_embedding()
                    .limit(self.policy.candidate_pool),
            )
            .await?;

        let candidates = rank_locally(&query_embedding, pool, self.policy.natural_result_cap);
        if candidates.is_empty() {
            info!("Vector search found no candidates");
            return Ok(VectorOutcome::Unavailable(Unavailable::NoResults));
        }

        info!(
            source = "local_scan",
            count = candidates.len(),
            "Vector search found candidates"
        );
        Ok(VectorOutcome::Found {
            candidates,
            source: VectorSource::LocalScan,
        })
    }
}

/// Score every candidate with a usable embedding against the query vector,
/// best first, at most `cap` of them.
///
/// Candidates without an embedding, or whose embedding length differs from
/// the query's, are skipped.
pub fn rank_locally(query_embedding: &[f32], pool: Vec<Profile>, cap: usize) -> Vec<Profile> {
    let mut scored: Vec<(f32, Profile)> = pool
        .into_iter()
        .filter_map(|profile| {
            let embedding = profile.embedding.as_deref()?;
            if embedding.len() != query_embedding.len() {
                return None;
            }
            let similarity = cosine_similarity(query_embedding, embedding);
            Some((similarity, profile))
        })
        .collect();

    // Stable sort keeps pool order among equal similarities.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(cap)
        .map(|(similarity, profile)| profile.with_match_score(similarity_to_score(similarity)))
        .collect()
}
