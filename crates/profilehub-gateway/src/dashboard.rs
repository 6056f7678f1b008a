use crate::error::ApiError;
use crate::middleware::Caller;
use crate::server::AppState;
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Datelike, Utc};
use profilehub_core::{JobGrade, PositionRole, Profile};
use profilehub_search::Industry;
use profilehub_store::ProfileQuery;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const RECENT_LIMIT: usize = 5;

/// Head count for one industry category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndustryCount {
    /// Category.
    pub industry: Industry,
    /// Profiles with at least one literal of the category.
    pub count: usize,
}

/// A recently updated profile as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RecentProfile {
    /// Profile id.
    pub id: Uuid,
    /// Masked to the first character for anonymous callers.
    pub name: String,
    /// Job function.
    pub position_role: Option<PositionRole>,
    /// Job grade.
    pub job_grade: Option<JobGrade>,
    /// Omitted in the blurred view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Omitted in the blurred view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Body of `GET /dashboard/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Every profile in the store.
    pub total_profiles: usize,
    /// Profiles created in the current calendar month (UTC).
    pub new_this_month: usize,
    /// Per-category head counts, table order.
    pub industries: Vec<IndustryCount>,
    /// Five most recently updated profiles.
    pub recent_updates: Vec<RecentProfile>,
    /// Personal details are masked.
    pub blurred: bool,
}

impl DashboardStats {
    /// Aggregate statistics over `profiles` as of `now`.
    ///
    /// A profile counts once per industry category no matter how many
    /// synonyms of it are stored.
    pub fn compute(profiles: &[Profile], total: usize, now: DateTime<Utc>, blurred: bool) -> Self {
        let new_this_month = profiles
            .iter()
            .filter(|p| p.created_at.year() == now.year() && p.created_at.month() == now.month())
            .count();

        let industries = Industry::ALL
            .iter()
            .map(|industry| IndustryCount {
                industry: *industry,
                count: profiles
                    .iter()
                    .filter(|p| {
                        p.industry_experience
                            .iter()
                            .filter_map(|v| Industry::classify_stored(v))
                            .collect::<HashSet<_>>()
                            .contains(industry)
                    })
                    .count(),
            })
            .collect();

        let mut recent: Vec<&Profile> = profiles.iter().collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let recent_updates = recent
            .into_iter()
            .take(RECENT_LIMIT)
            .map(|p| RecentProfile {
                id: p.id,
                name: if blurred { p.masked_name() } else { p.name.clone() },
                position_role: p.position_role,
                job_grade: p.job_grade,
                email: (!blurred).then(|| p.email.clone()),
                skills: (!blurred).then(|| p.skills.clone()),
                updated_at: p.updated_at,
            })
            .collect();

        Self {
            total_profiles: total,
            new_this_month,
            industries,
            recent_updates,
            blurred,
        }
    }
}

/// `GET /dashboard/stats`. Open to anonymous callers, who get the blurred view.
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<DashboardStats>, ApiError> {
    let all = ProfileQuery::new();
    let (total, profiles) = tokio::try_join!(state.store.count(), state.store.query(&all))?;
    Ok(Json(DashboardStats::compute(
        &profiles,
        total,
        Utc::now(),
        caller.is_anonymous(),
    )))
}
