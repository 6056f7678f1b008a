use crate::error::ApiError;
use crate::middleware::Caller;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use profilehub_core::{Profile, ProfileDetail, ProfileHubError};
use profilehub_security::Role;
use profilehub_store::{ProfileQuery, ProfileStore};
use std::sync::Arc;
use uuid::Uuid;

/// Every profile, newest first, without embeddings.
pub(crate) async fn all_profiles(store: &dyn ProfileStore) -> Result<Vec<Profile>, ApiError> {
    let rows = store.query(&ProfileQuery::new().newest_first()).await?;
    Ok(rows.into_iter().map(Profile::without_embedding).collect())
}

/// One profile with its dependents, or 404.
pub(crate) async fn profile_detail(
    store: &dyn ProfileStore,
    id: Uuid,
) -> Result<ProfileDetail, ApiError> {
    let mut detail = store
        .detail(id)
        .await?
        .ok_or_else(|| ProfileHubError::NotFound(format!("Profile {id} not found")))?;
    detail.profile.embedding = None;
    Ok(detail)
}

/// `GET /profiles`
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    caller.require(Role::Viewer)?;
    Ok(Json(all_profiles(state.store.as_ref()).await?))
}

/// `GET /profiles/{id}`
pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileDetail>, ApiError> {
    caller.require(Role::Viewer)?;
    Ok(Json(profile_detail(state.store.as_ref(), id).await?))
}
