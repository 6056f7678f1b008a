use crate::error::ApiError;
use crate::middleware::Caller;
use crate::profiles::{all_profiles, profile_detail};
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use profilehub_core::{Profile, ProfileDetail, ProfileHubError, ProfileInput};
use profilehub_security::Role;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Decode and normalize an admin payload. Unknown enum values, a blank
/// name, or a malformed email are all 400s.
fn parse_input(body: Result<Json<Value>, JsonRejection>) -> Result<ProfileInput, ApiError> {
    let Json(value) = body?;
    let input: ProfileInput = serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid profile: {e}")))?;
    Ok(input.normalize()?)
}

/// `GET /admin/profiles`
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    caller.require(Role::Admin)?;
    Ok(Json(all_profiles(state.store.as_ref()).await?))
}

/// `GET /admin/profiles/{id}`
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileDetail>, ApiError> {
    caller.require(Role::Admin)?;
    Ok(Json(profile_detail(state.store.as_ref(), id).await?))
}

/// `POST /admin/profiles`
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ProfileDetail>), ApiError> {
    caller.require(Role::Admin)?;
    let input = parse_input(body)?;
    let employment = input.employment_history.clone();
    let projects = input.project_careers.clone();

    let profile = state.store.insert(Profile::new(input)).await?;
    if let Err(e) = state
        .store
        .replace_children(profile.id, employment, projects)
        .await
    {
        // Do not leave a profile without the history it was submitted with.
        warn!(profile_id = %profile.id, error = %e, "Writing dependents failed, removing new profile");
        if let Err(cleanup) = state.store.delete(profile.id).await {
            warn!(profile_id = %profile.id, error = %cleanup, "Partial create left behind");
        }
        return Err(e.into());
    }
    info!(profile_id = %profile.id, "Profile created");

    let detail = profile_detail(state.store.as_ref(), profile.id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `PUT /admin/profiles/{id}`
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProfileDetail>, ApiError> {
    caller.require(Role::Admin)?;
    let input = parse_input(body)?;
    let employment = input.employment_history.clone();
    let projects = input.project_careers.clone();

    let mut profile = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ProfileHubError::NotFound(format!("Profile {id} not found")))?;
    profile.apply(input);
    state.store.update(profile).await?;
    state.store.replace_children(id, employment, projects).await?;
    info!(profile_id = %id, "Profile updated");

    Ok(Json(profile_detail(state.store.as_ref(), id).await?))
}

/// `DELETE /admin/profiles/{id}`
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require(Role::Admin)?;
    if !state.store.delete(id).await? {
        return Err(ProfileHubError::NotFound(format!("Profile {id} not found")).into());
    }
    info!(profile_id = %id, "Profile deleted");
    Ok(StatusCode::NO_CONTENT)
}
