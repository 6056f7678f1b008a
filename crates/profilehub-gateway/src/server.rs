use crate::extraction::TextExtractor;
use crate::middleware::{auth_middleware, rate_limit_middleware, MiddlewareState};
use crate::storage::ObjectStorage;
use crate::{admin, dashboard, profiles, search, upload};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_mw,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use profilehub_search::{FilterSearch, NaturalSearch};
use profilehub_security::{AccessControl, RateLimiter, Sanitizer};
use profilehub_store::ProfileStore;
use std::sync::Arc;
use tower::ServiceBuilder;

/// Request bodies above this are rejected before reaching a handler.
const DOCUMENT_BODY_LIMIT: usize = 20 * 1024 * 1024;
/// Base64 inflates a 5 MB image to about 6.7 MB of JSON.
const AVATAR_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    /// Profile datastore.
    pub store: Arc<dyn ProfileStore>,
    /// Natural-language pipeline.
    pub natural: NaturalSearch,
    /// Structured filter search.
    pub filter: FilterSearch,
    /// Query sanitizer.
    pub sanitizer: Arc<Sanitizer>,
    /// Document-to-text service; `None` disables `/admin/upload`.
    pub extractor: Option<Arc<dyn TextExtractor>>,
    /// Avatar bucket; `None` disables `/uploads/avatar`.
    pub avatars: Option<Arc<dyn ObjectStorage>>,
    /// Shared secret expected in `x-n8n-avatar-secret`. `None` disables the check.
    pub avatar_secret: Option<String>,
}

impl AppState {
    /// State without extractor, avatar storage, or custom sanitizer.
    pub fn new(store: Arc<dyn ProfileStore>, natural: NaturalSearch, filter: FilterSearch) -> Self {
        Self {
            store,
            natural,
            filter,
            sanitizer: Arc::new(Sanitizer::default()),
            extractor: None,
            avatars: None,
            avatar_secret: None,
        }
    }

    /// Replace the default sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Arc::new(sanitizer);
        self
    }

    /// Enable document uploads.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Enable avatar uploads, guarded by `secret` when set.
    pub fn with_avatar_storage(
        mut self,
        storage: Arc<dyn ObjectStorage>,
        secret: Option<String>,
    ) -> Self {
        self.avatars = Some(storage);
        self.avatar_secret = secret.filter(|s| !s.is_empty());
        self
    }
}

/// The main gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth or rate limiting.
    pub fn build(state: AppState) -> Router {
        Self::build_with_middleware(state, AccessControl::default(), None)
    }

    /// Build the gateway with API-key access control and optional rate limiting.
    pub fn build_with_middleware(
        state: AppState,
        access: AccessControl,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let mw_state = Arc::new(MiddlewareState {
            access,
            rate_limiter,
            sanitizer: state.sanitizer.clone(),
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/search/natural", post(search::natural_handler))
            .route("/search/filter", post(search::filter_handler))
            .route("/profiles", get(profiles::list_handler))
            .route("/profiles/{id}", get(profiles::detail_handler))
            .route(
                "/admin/profiles",
                get(admin::list_handler).post(admin::create_handler),
            )
            .route(
                "/admin/profiles/{id}",
                get(admin::get_handler)
                    .put(admin::update_handler)
                    .delete(admin::delete_handler),
            )
            .route(
                "/admin/upload",
                post(upload::document_handler).layer(DefaultBodyLimit::max(DOCUMENT_BODY_LIMIT)),
            )
            .route(
                "/uploads/avatar",
                post(upload::avatar_handler).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
            )
            .route("/dashboard/stats", get(dashboard::stats_handler))
            .with_state(Arc::new(state))
            .layer(
                ServiceBuilder::new()
                    .layer(axum_mw::from_fn_with_state(
                        mw_state.clone(),
                        auth_middleware,
                    ))
                    .layer(axum_mw::from_fn_with_state(mw_state, rate_limit_middleware)),
            )
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "profilehub"}))
}
