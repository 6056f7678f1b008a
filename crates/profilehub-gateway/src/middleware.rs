use crate::error::ApiError;
use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use profilehub_security::{AccessControl, BucketKey, RateDecision, RateLimiter, Role, Sanitizer};
use std::sync::Arc;
use tracing::warn;

/// Who is calling. Inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// `None` for anonymous callers.
    pub role: Option<Role>,
    /// The presented API key, used as the rate-limit bucket.
    pub key: Option<String>,
}

impl Caller {
    /// Caller without an API key.
    pub fn anonymous() -> Self {
        Self {
            role: None,
            key: None,
        }
    }

    /// No key was presented.
    pub fn is_anonymous(&self) -> bool {
        self.role.is_none()
    }

    /// Reject callers lacking `required`.
    pub fn require(&self, required: Role) -> Result<Role, ApiError> {
        match self.role {
            Some(role) if role.allows(required) => Ok(role),
            Some(_) => Err(ApiError::Forbidden("Insufficient permissions")),
            None => Err(ApiError::Unauthorized("API key required")),
        }
    }

    /// Rate-limit bucket this caller is charged to.
    pub fn bucket(&self) -> BucketKey {
        BucketKey::for_key(self.key.as_deref())
    }
}

/// Shared middleware state.
#[derive(Clone)]
pub struct MiddlewareState {
    /// Key to role mapping.
    pub access: AccessControl,
    /// `None` disables rate limiting.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    /// Cleans header values before they are logged.
    pub sanitizer: Arc<Sanitizer>,
}

/// Query string accepted by [`auth_middleware`].
#[derive(serde::Deserialize, Default)]
pub struct AuthQuery {
    /// Alternative to the `Authorization` header.
    pub api_key: Option<String>,
}

/// Auth middleware: resolves the caller's role from the API key.
///
/// Checks `Authorization: Bearer <key>` header first, then `?api_key=<key>` query param.
/// A missing key yields an anonymous caller; endpoints decide whether that is
/// enough. An unknown key is rejected outright. With no keys configured every
/// caller is an admin.
pub async fn auth_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    query: Query<AuthQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    let key_from_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());
    let key = key_from_header.or_else(|| query.api_key.clone());

    let caller = if !state.access.is_enabled() {
        Caller {
            role: Some(Role::Admin),
            key,
        }
    } else {
        match key {
            Some(k) => match state.access.resolve(Some(&k)) {
                Some(role) => Caller {
                    role: Some(role),
                    key: Some(k),
                },
                None => {
                    let user_agent = headers
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("");
                    warn!(
                        user_agent = %state.sanitizer.sanitize_header(user_agent),
                        "Rejected request: invalid API key"
                    );
                    return ApiError::Unauthorized("Invalid API key").into_response();
                }
            },
            None => Caller::anonymous(),
        }
    };

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Rate limiting middleware: one token bucket per API key.
pub async fn rate_limit_middleware(
    State(state): State<Arc<MiddlewareState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        let bucket = request
            .extensions()
            .get::<Caller>()
            .map_or(BucketKey::Anonymous, Caller::bucket);

        if let RateDecision::Limited { retry_after } = limiter.check(&bucket).await {
            warn!(
                anonymous = bucket == BucketKey::Anonymous,
                retry_after_secs = retry_after.as_secs(),
                "Rate limited request"
            );
            return ApiError::TooManyRequests { retry_after }.into_response();
        }
    }

    next.run(request).await
}
