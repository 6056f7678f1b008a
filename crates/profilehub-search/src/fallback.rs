use crate::facets::Facets;
use crate::pipeline::SearchPolicy;
use futures_util::future::join_all;
use profilehub_core::{Profile, ProfileHubError, ProfileHubResult};
use profilehub_store::{ArrayColumn, Column, ProfileQuery, ProfileStore, TextColumn};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A planned sub-query and the score its new hits receive.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    /// The read to run.
    pub query: ProfileQuery,
    /// Score given to rows this query contributes.
    pub score: u32,
}

/// Two-tier keyword retrieval used when the vector path is unavailable.
///
/// Tier A runs one structured query per stored literal of every matched
/// industry (or a single equality query when only role/grade/education
/// matched). Tier B runs substring queries over the career narrative, and
/// only when no facet matched at all.
pub struct KeywordFallback {
    policy: SearchPolicy,
}

impl KeywordFallback {
    /// Fallback using the caps and scores of `policy`.
    pub fn new(policy: SearchPolicy) -> Self {
        Self { policy }
    }

    /// The sub-queries to run, in merge priority order.
    pub fn plan(&self, query: &str, facets: &Facets) -> Vec<SubQuery> {
        let cap = self.policy.natural_result_cap;

        if !facets.industries.is_empty() {
            return facets
                .stored_industry_values()
                .into_iter()
                .map(|value| SubQuery {
                    query: with_scalar_facets(
                        ProfileQuery::new().contains(ArrayColumn::IndustryExperience, [value]),
                        facets,
                    )
                    .limit(cap),
                    score: self.policy.structured_score,
                })
                .collect();
        }

        if facets.has_scalar() {
            return vec![SubQuery {
                query: with_scalar_facets(ProfileQuery::new(), facets).limit(cap),
                score: self.policy.structured_score,
            }];
        }

        keyword_tokens(query, self.policy.keyword_min_chars, self.policy.keyword_token_limit)
            .into_iter()
            .map(|token| SubQuery {
                query: ProfileQuery::new()
                    .ilike(TextColumn::CareerDescription, token)
                    .limit(cap),
                score: self.policy.keyword_score,
            })
            .collect()
    }

    /// Run the plan, merge hits in plan order (first occurrence wins),
    /// re-apply the facet filter, and cap the result.
    ///
    /// Sub-queries run concurrently. A failing sub-query contributes no rows;
    /// if every sub-query fails the last error is returned.
    pub async fn retrieve(
        &self,
        store: &dyn ProfileStore,
        query: &str,
        facets: &Facets,
    ) -> ProfileHubResult<Vec<Profile>> {
        let plan = self.plan(query, facets);
        if plan.is_empty() {
            debug!("Keyword fallback has nothing to search for");
            return Ok(Vec::new());
        }

        let results = join_all(plan.iter().map(|sub| store.query(&sub.query))).await;

        let mut batches = Vec::with_capacity(plan.len());
        let mut last_error: Option<ProfileHubError> = None;
        for (sub, result) in plan.iter().zip(results) {
            match result {
                Ok(rows) => batches.push((sub, rows)),
                Err(e) => {
                    warn!(
                        filters = ?sub.query.filters(),
                        error = %e,
                        "Keyword sub-query failed, continuing without it"
                    );
                    last_error = Some(e);
                }
            }
        }

        if batches.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let mut filtered = facets.apply(merge_in_plan_order(batches));
        filtered.truncate(self.policy.natural_result_cap);
        Ok(filtered)
    }
}

/// Merge sub-query rows in plan order. A profile keeps the score of the
/// first sub-query that returned it; later duplicates are dropped.
pub fn merge_in_plan_order<'a>(
    batches: impl IntoIterator<Item = (&'a SubQuery, Vec<Profile>)>,
) -> Vec<Profile> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for (sub, rows) in batches {
        for profile in rows {
            if seen.insert(profile.id) {
                merged.push(profile.with_match_score(sub.score));
            }
        }
    }
    merged
}

fn with_scalar_facets(mut query: ProfileQuery, facets: &Facets) -> ProfileQuery {
    if let Some(role) = facets.role {
        query = query.eq(Column::PositionRole, role.as_str());
    }
    if let Some(grade) = facets.job_grade {
        query = query.eq(Column::JobGrade, grade.as_str());
    }
    if let Some(education) = facets.education {
        query = query.eq(Column::Education, education.as_str());
    }
    query
}

/// Whitespace-delimited tokens of at least `min_chars` characters, the
/// first `limit` of them.
pub fn keyword_tokens(query: &str, min_chars: usize, limit: usize) -> Vec<&str> {
    query
        .split_whitespace()
        .filter(|token| token.chars().count() >= min_chars)
        .take(limit)
        .collect()
}
