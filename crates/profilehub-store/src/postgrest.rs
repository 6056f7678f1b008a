use crate::{AccessMode, Filter, ProfileQuery, ProfileStore, SimilarProfile};
use async_trait::async_trait;
use profilehub_core::{
    CapabilityScores, EmploymentHistory, Profile, ProfileDetail, ProfileHubError,
    ProfileHubResult, ProjectCareer,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const PROFILES: &str = "profiles";
const EMPLOYMENT_HISTORY: &str = "profile_employment_history";
const PROJECT_CAREERS: &str = "profile_projects";
const CAPABILITIES: &str = "profile_capabilities";

/// Supabase/PostgREST profile store.
///
/// Works against any PostgREST endpoint that exposes the `profiles` table,
/// its dependent tables, and the `match_profiles` RPC.
pub struct PostgrestStore {
    base_url: String,
    api_key: String,
    bearer: String,
    mode: AccessMode,
    http: reqwest::Client,
}

impl PostgrestStore {
    /// Authenticate with the service-role key. Row-level security is bypassed.
    pub fn privileged(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> ProfileHubResult<Self> {
        let key = service_key.into();
        Self::build(base_url.into(), key.clone(), key, AccessMode::Privileged, timeout)
    }

    /// Authenticate with the anon key, optionally acting on behalf of a
    /// signed-in user. Row-level security applies.
    pub fn ambient(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        user_token: Option<String>,
        timeout: Duration,
    ) -> ProfileHubResult<Self> {
        let key = anon_key.into();
        let bearer = user_token.unwrap_or_else(|| key.clone());
        Self::build(base_url.into(), key, bearer, AccessMode::Ambient, timeout)
    }

    fn build(
        base_url: String,
        api_key: String,
        bearer: String,
        mode: AccessMode,
        timeout: Duration,
    ) -> ProfileHubResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProfileHubError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bearer,
            mode,
            http,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn add_auth_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ProfileHubResult<reqwest::Response> {
        let resp = self
            .add_auth_headers(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT || body.contains("23505") {
            return Err(ProfileHubError::Conflict(truncate(&body, 200)));
        }
        Err(ProfileHubError::Datastore(format!(
            "PostgREST error {}: {}",
            status.as_u16(),
            truncate(&body, 200)
        )))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(String, String)],
    ) -> ProfileHubResult<Vec<T>> {
        let resp = self
            .send(self.http.get(self.table_url(table)).query(params))
            .await?;
        resp.json()
            .await
            .map_err(|e| ProfileHubError::Datastore(format!("Invalid PostgREST response: {e}")))
    }

    async fn insert_rows<T: serde::Serialize + Sync>(
        &self,
        table: &str,
        rows: &[T],
    ) -> ProfileHubResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.send(
            self.http
                .post(self.table_url(table))
                .header("Prefer", "return=minimal")
                .json(rows),
        )
        .await?;
        Ok(())
    }

    async fn delete_where(&self, table: &str, column: &str, id: Uuid) -> ProfileHubResult<()> {
        self.send(
            self.http
                .delete(self.table_url(table))
                .query(&[(column, format!("eq.{id}"))]),
        )
        .await?;
        Ok(())
    }

    fn by_profile(id: Uuid) -> Vec<(String, String)> {
        vec![
            ("select".to_string(), "*".to_string()),
            ("profile_id".to_string(), format!("eq.{id}")),
            ("order".to_string(), "created_at.asc".to_string()),
        ]
    }
}

#[async_trait]
impl ProfileStore for PostgrestStore {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    async fn query(&self, query: &ProfileQuery) -> ProfileHubResult<Vec<Profile>> {
        let params = query_params(query);
        debug!(params = ?params, "PostgREST profile query");
        self.fetch(PROFILES, &params).await
    }

    async fn match_profiles(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> ProfileHubResult<Vec<SimilarProfile>> {
        let body = serde_json::json!({
            "query_embedding": query_embedding,
            "match_threshold": threshold,
            "match_count": count,
        });
        let resp = self
            .send(
                self.http
                    .post(format!("{}/rest/v1/rpc/match_profiles", self.base_url))
                    .json(&body),
            )
            .await?;
        let rows: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ProfileHubError::Datastore(format!("Invalid RPC response: {e}")))?;

        rows.into_iter().map(parse_similar_row).collect()
    }

    async fn get(&self, id: Uuid) -> ProfileHubResult<Option<Profile>> {
        let rows: Vec<Profile> = self
            .fetch(
                PROFILES,
                &[
                    ("select".to_string(), "*".to_string()),
                    ("id".to_string(), format!("eq.{id}")),
                    ("limit".to_string(), "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn detail(&self, id: Uuid) -> ProfileHubResult<Option<ProfileDetail>> {
        let Some(profile) = self.get(id).await? else {
            return Ok(None);
        };
        let params = Self::by_profile(id);
        let capability_params = [
            ("select".to_string(), "*".to_string()),
            ("profile_id".to_string(), format!("eq.{id}")),
            ("limit".to_string(), "1".to_string()),
        ];
        let (employment_history, project_careers, capabilities) = tokio::try_join!(
            self.fetch::<EmploymentHistory>(EMPLOYMENT_HISTORY, &params),
            self.fetch::<ProjectCareer>(PROJECT_CAREERS, &params),
            self.fetch::<CapabilityScores>(CAPABILITIES, &capability_params),
        )?;

        Ok(Some(ProfileDetail {
            profile,
            employment_history,
            project_careers,
            capabilities: capabilities.into_iter().next(),
        }))
    }

    async fn insert(&self, profile: Profile) -> ProfileHubResult<Profile> {
        self.insert_rows(PROFILES, &[writable_row(&profile)?])
            .await?;
        Ok(profile)
    }

    async fn update(&self, profile: Profile) -> ProfileHubResult<Profile> {
        let resp = self
            .send(
                self.http
                    .patch(self.table_url(PROFILES))
                    .query(&[("id", format!("eq.{}", profile.id))])
                    .header("Prefer", "return=representation")
                    .json(&writable_row(&profile)?),
            )
            .await?;
        let rows: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ProfileHubError::Datastore(format!("Invalid PostgREST response: {e}")))?;
        if rows.is_empty() {
            return Err(ProfileHubError::NotFound(format!("profile {}", profile.id)));
        }
        Ok(profile)
    }

    async fn delete(&self, id: Uuid) -> ProfileHubResult<bool> {
        // Dependents first in case the schema lacks ON DELETE CASCADE.
        self.delete_where(EMPLOYMENT_HISTORY, "profile_id", id).await?;
        self.delete_where(PROJECT_CAREERS, "profile_id", id).await?;
        self.delete_where(CAPABILITIES, "profile_id", id).await?;

        let resp = self
            .send(
                self.http
                    .delete(self.table_url(PROFILES))
                    .query(&[("id", format!("eq.{id}"))])
                    .header("Prefer", "return=representation"),
            )
            .await?;
        let rows: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ProfileHubError::Datastore(format!("Invalid PostgREST response: {e}")))?;
        Ok(!rows.is_empty())
    }

    async fn replace_children(
        &self,
        profile_id: Uuid,
        employment_history: Vec<String>,
        project_careers: Vec<String>,
    ) -> ProfileHubResult<()> {
        let params = Self::by_profile(profile_id);
        let previous_jobs: Vec<EmploymentHistory> =
            self.fetch(EMPLOYMENT_HISTORY, &params).await?;
        let previous_projects: Vec<ProjectCareer> = self.fetch(PROJECT_CAREERS, &params).await?;

        self.delete_where(EMPLOYMENT_HISTORY, "profile_id", profile_id)
            .await?;
        self.delete_where(PROJECT_CAREERS, "profile_id", profile_id)
            .await?;

        let jobs: Vec<EmploymentHistory> = employment_history
            .into_iter()
            .map(|company| EmploymentHistory::new(profile_id, company))
            .collect();
        let projects: Vec<ProjectCareer> = project_careers
            .into_iter()
            .map(|project| ProjectCareer::new(profile_id, project))
            .collect();

        let written = match self.insert_rows(EMPLOYMENT_HISTORY, &jobs).await {
            Ok(()) => self.insert_rows(PROJECT_CAREERS, &projects).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // PostgREST has no multi-request transaction; restore what was there.
            warn!(
                profile_id = %profile_id,
                error = %e,
                "Child replace failed, restoring previous rows"
            );
            let _ = self
                .delete_where(EMPLOYMENT_HISTORY, "profile_id", profile_id)
                .await;
            let _ = self
                .delete_where(PROJECT_CAREERS, "profile_id", profile_id)
                .await;
            let _ = self.insert_rows(EMPLOYMENT_HISTORY, &previous_jobs).await;
            let _ = self.insert_rows(PROJECT_CAREERS, &previous_projects).await;
            return Err(e);
        }
        Ok(())
    }

    async fn upsert_capabilities(&self, scores: CapabilityScores) -> ProfileHubResult<()> {
        self.send(
            self.http
                .post(self.table_url(CAPABILITIES))
                .query(&[("on_conflict", "profile_id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&[scores]),
        )
        .await?;
        Ok(())
    }

    async fn count(&self) -> ProfileHubResult<usize> {
        let resp = self
            .send(
                self.http
                    .head(self.table_url(PROFILES))
                    .query(&[("select", "id")])
                    .header("Prefer", "count=exact"),
            )
            .await?;
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                ProfileHubError::Datastore("Missing or invalid Content-Range header".to_string())
            })
    }
}

/// Encode a [`ProfileQuery`] as PostgREST query-string parameters.
pub fn query_params(query: &ProfileQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];

    for filter in query.filters() {
        let (column, value) = match filter {
            Filter::Eq(column, value) => (column.name(), format!("eq.{value}")),
            Filter::Contains(column, values) => (column.name(), format!("cs.{}", pg_array(values))),
            Filter::Overlaps(column, values) => (column.name(), format!("ov.{}", pg_array(values))),
            Filter::ILike(column, needle) => {
                (column.name(), format!("ilike.*{}*", escape_like(needle)))
            }
            Filter::HasEmbedding => ("embedding", "not.is.null".to_string()),
        };
        params.push((column.to_string(), value));
    }

    if query.is_newest_first() {
        params.push(("order".to_string(), "created_at.desc".to_string()));
    }
    if let Some(limit) = query.limit_value() {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Postgres array literal with every element quoted.
fn pg_array(values: &[String]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", items.join(","))
}

/// Escape LIKE metacharacters. `*` is PostgREST's wildcard and is dropped.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        match c {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '*' => {}
            _ => out.push(c),
        }
    }
    out
}

fn parse_similar_row(mut row: serde_json::Value) -> ProfileHubResult<SimilarProfile> {
    let similarity = row
        .as_object_mut()
        .and_then(|obj| obj.remove("similarity"))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ProfileHubError::Datastore("RPC row without similarity".to_string()))?;
    let profile: Profile = serde_json::from_value(row)
        .map_err(|e| ProfileHubError::Datastore(format!("Invalid RPC row: {e}")))?;
    Ok(SimilarProfile {
        profile,
        similarity: similarity as f32,
    })
}

/// Profile columns owned by this service. The embedding belongs to the
/// ingestion pipeline and the match score is never persisted.
fn writable_row(profile: &Profile) -> ProfileHubResult<serde_json::Value> {
    let mut row = serde_json::to_value(profile)?;
    if let Some(obj) = row.as_object_mut() {
        obj.remove("embedding");
        obj.remove("match_score");
    }
    Ok(row)
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit('/').next()?.trim().parse().ok()
}

fn transport_error(e: reqwest::Error) -> ProfileHubError {
    if e.is_timeout() {
        ProfileHubError::Timeout(format!("datastore request timed out: {e}"))
    } else {
        ProfileHubError::Http(e.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{ArrayColumn, Column, TextColumn};

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_query_params_operators() {
        let q = ProfileQuery::new()
            .eq(Column::PositionRole, "프론트엔드개발자")
            .contains(ArrayColumn::IndustryExperience, ["금융"])
            .overlaps(ArrayColumn::Skills, ["React", "Vue"])
            .newest_first()
            .limit(20);
        let params = query_params(&q);

        assert_eq!(param(&params, "select"), vec!["*"]);
        assert_eq!(param(&params, "position_role"), vec!["eq.프론트엔드개발자"]);
        assert_eq!(param(&params, "industry_experience"), vec!["cs.{\"금융\"}"]);
        assert_eq!(param(&params, "skills"), vec!["ov.{\"React\",\"Vue\"}"]);
        assert_eq!(param(&params, "order"), vec!["created_at.desc"]);
        assert_eq!(param(&params, "limit"), vec!["20"]);
    }

    #[test]
    fn test_query_params_ilike_and_embedding() {
        let q = ProfileQuery::new()
            .ilike(TextColumn::CareerDescription, "100%_done*")
            .has_embedding();
        let params = query_params(&q);
        assert_eq!(
            param(&params, "career_description"),
            vec!["ilike.*100\\%\\_done*"]
        );
        assert_eq!(param(&params, "embedding"), vec!["not.is.null"]);
        assert!(param(&params, "limit").is_empty());
    }

    #[test]
    fn test_pg_array_quotes_elements() {
        assert_eq!(
            pg_array(&["a,b".to_string(), "say \"hi\"".to_string()]),
            "{\"a,b\",\"say \\\"hi\\\"\"}"
        );
    }

    #[test]
    fn test_writable_row_drops_search_columns() {
        let mut profile = Profile::new(profilehub_core::ProfileInput {
            name: "김철수".into(),
            email: "c@example.com".into(),
            ..Default::default()
        });
        profile.embedding = Some(vec![1.0]);
        profile.match_score = 90;
        let row = writable_row(&profile).unwrap();
        assert!(row.get("embedding").is_none());
        assert!(row.get("match_score").is_none());
        assert_eq!(row["email"], "c@example.com");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
    }

    #[test]
    fn test_ambient_uses_user_token_as_bearer() {
        let store = PostgrestStore::ambient(
            "http://localhost/",
            "anon",
            Some("user-jwt".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(store.access_mode(), AccessMode::Ambient);
        assert_eq!(store.bearer, "user-jwt");
        assert_eq!(store.api_key, "anon");
        assert_eq!(store.table_url("profiles"), "http://localhost/rest/v1/profiles");
    }
}
