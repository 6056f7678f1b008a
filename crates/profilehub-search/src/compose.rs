use crate::facets::Facets;
use profilehub_core::Profile;

/// Final stage of every natural-language search.
///
/// Drops candidates failing any non-empty facet, keeps the incoming order,
/// caps the list, and strips embeddings so they never leave the process.
pub fn compose(candidates: Vec<Profile>, facets: &Facets, cap: usize) -> Vec<Profile> {
    facets
        .apply(candidates)
        .into_iter()
        .take(cap)
        .map(Profile::without_embedding)
        .collect()
}
