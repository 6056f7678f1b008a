use profilehub_core::{Education, JobGrade, PositionRole, Profile, ProfileHubResult};
use profilehub_store::{ArrayColumn, Column, ProfileQuery, ProfileStore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// A JSON field accepting either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value: the array must contain it.
    One(String),
    /// A list: the array must share at least one value.
    Many(Vec<String>),
}

/// Structured search request. Every field is optional; blank values are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Korean label or English alias.
    #[serde(default)]
    pub job_grade: Option<String>,
    /// Korean label or English alias.
    #[serde(default)]
    pub education: Option<String>,
    /// Korean label or English alias.
    #[serde(default)]
    pub position_role: Option<String>,
    /// A list matches any of its values; a single string must be contained.
    #[serde(default)]
    pub industry_experience: Option<OneOrMany>,
    /// Matches profiles holding any of the listed skills.
    #[serde(default)]
    pub skills: Option<Vec<String>>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn non_blank_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an enum facet, accepting the stored label or its English alias,
/// and return the stored label.
fn stored_label<T>(value: Option<&str>) -> ProfileHubResult<Option<String>>
where
    T: FromStr<Err = profilehub_core::ProfileHubError> + std::fmt::Display,
{
    value
        .map(|raw| raw.parse::<T>().map(|v| v.to_string()))
        .transpose()
}

impl FilterRequest {
    /// Translate the request into a datastore query capped at `cap` rows.
    ///
    /// Unknown job grade, education, or role values are a `Validation` error.
    pub fn to_query(&self, cap: usize) -> ProfileHubResult<ProfileQuery> {
        let mut query = ProfileQuery::new();

        if let Some(grade) = stored_label::<JobGrade>(non_blank(&self.job_grade))? {
            query = query.eq(Column::JobGrade, grade);
        }
        if let Some(education) = stored_label::<Education>(non_blank(&self.education))? {
            query = query.eq(Column::Education, education);
        }
        if let Some(role) = stored_label::<PositionRole>(non_blank(&self.position_role))? {
            query = query.eq(Column::PositionRole, role);
        }

        match &self.industry_experience {
            Some(OneOrMany::Many(values)) => {
                let values = non_blank_list(values);
                if !values.is_empty() {
                    query = query.overlaps(ArrayColumn::IndustryExperience, values);
                }
            }
            Some(OneOrMany::One(value)) if !value.trim().is_empty() => {
                query = query.contains(ArrayColumn::IndustryExperience, [value.trim()]);
            }
            _ => {}
        }

        if let Some(skills) = &self.skills {
            let skills = non_blank_list(skills);
            if !skills.is_empty() {
                query = query.overlaps(ArrayColumn::Skills, skills);
            }
        }

        Ok(query.limit(cap))
    }
}

/// Structured search: explicit filters, no scoring.
pub struct FilterSearch {
    store: Arc<dyn ProfileStore>,
    cap: usize,
}

impl FilterSearch {
    /// Search returning at most `cap` rows.
    pub fn new(store: Arc<dyn ProfileStore>, cap: usize) -> Self {
        Self { store, cap }
    }

    /// Run the filters. Every result carries `match_score = 0`.
    pub async fn search(&self, request: &FilterRequest) -> ProfileHubResult<Vec<Profile>> {
        let query = request.to_query(self.cap)?;
        let rows = self.store.query(&query).await?;
        let results: Vec<Profile> = rows
            .into_iter()
            .take(self.cap)
            .map(|p| p.with_match_score(0).without_embedding())
            .collect();
        info!(
            filters = query.filters().len(),
            count = results.len(),
            "Filter search complete"
        );
        Ok(results)
    }
}
