use crate::error::ApiError;
use crate::middleware::Caller;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use profilehub_core::Profile;
use profilehub_search::{FilterRequest, SearchOutcome};
use profilehub_security::{Role, SanitizeResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Response of the filter endpoint.
#[derive(Debug, Serialize)]
pub struct FilterResponse {
    /// Matching profiles.
    pub results: Vec<Profile>,
    /// `results.len()`.
    pub count: usize,
}

/// Pull a usable query string out of `{"query": ...}`.
fn query_text(body: &Value) -> Result<&str, ApiError> {
    match body.get("query") {
        Some(Value::String(q)) if !q.trim().is_empty() => Ok(q.as_str()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(ApiError::BadRequest("Search query is required".to_string()))
        }
        Some(_) => Err(ApiError::BadRequest("Search query must be a string".to_string())),
    }
}

/// `POST /search/natural` with `{"query": "..."}`.
pub async fn natural_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SearchOutcome>, ApiError> {
    caller.require(Role::Viewer)?;
    let Json(body) = body?;
    let raw = query_text(&body)?;

    let query = match state.sanitizer.sanitize(raw) {
        SanitizeResult::Rejected(reason) => return Err(ApiError::BadRequest(reason)),
        SanitizeResult::Cleaned(q) => {
            debug!("Stripped control characters from query");
            q
        }
        SanitizeResult::Clean(q) => q,
    };

    let outcome = state.natural.search(&query).await?;
    Ok(Json(outcome))
}

/// `POST /search/filter` with any subset of the filter fields.
pub async fn filter_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<FilterResponse>, ApiError> {
    caller.require(Role::Viewer)?;
    let Json(request) = body?;
    let results = state.filter.search(&request).await?;
    Ok(Json(FilterResponse {
        count: results.len(),
        results,
    }))
}
