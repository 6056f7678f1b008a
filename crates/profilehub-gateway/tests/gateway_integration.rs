#![allow(clippy::unwrap_used, clippy::expect_used)]

use profilehub_core::{PositionRole, Profile, ProfileInput};
use profilehub_gateway::{AppState, GatewayServer, HttpTextExtractor, InMemoryStorage};
use profilehub_search::{FilterSearch, NaturalSearch, SearchPolicy};
use profilehub_security::{AccessControl, ApiKeyEntry, RateLimiter, RateLimits, Role, Sanitizer};
use profilehub_store::{InMemoryProfileStore, ProfileStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_KEY: &str = "admin-secret";
const VIEWER_KEY: &str = "viewer-secret";
const AVATAR_SECRET: &str = "avatar-shared";

struct TestServer {
    base: String,
    store: Arc<InMemoryProfileStore>,
    storage: Arc<InMemoryStorage>,
    http: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn get(&self, path: &str, key: Option<&str>) -> reqwest::RequestBuilder {
        with_key(self.http.get(self.url(path)), key)
    }

    fn post(&self, path: &str, key: Option<&str>) -> reqwest::RequestBuilder {
        with_key(self.http.post(self.url(path)), key)
    }
}

fn with_key(req: reqwest::RequestBuilder, key: Option<&str>) -> reqwest::RequestBuilder {
    match key {
        Some(k) => req.bearer_auth(k),
        None => req,
    }
}

fn access() -> AccessControl {
    AccessControl::new(vec![
        ApiKeyEntry {
            key: ADMIN_KEY.into(),
            role: Role::Admin,
        },
        ApiKeyEntry {
            key: VIEWER_KEY.into(),
            role: Role::Viewer,
        },
    ])
}

/// Helper: build a test server on a random port.
async fn start_test_server(
    access: AccessControl,
    limiter: Option<Arc<RateLimiter>>,
    extraction_url: Option<String>,
) -> TestServer {
    let store = Arc::new(InMemoryProfileStore::new());
    let storage = Arc::new(InMemoryStorage::new("http://cdn.test/avatars"));
    let policy = SearchPolicy::default();

    let natural = NaturalSearch::new(store.clone(), None, policy.clone())
        .with_deadline(Duration::from_secs(5));
    let filter = FilterSearch::new(store.clone(), policy.filter_result_cap);
    let mut state = AppState::new(store.clone(), natural, filter)
        .with_sanitizer(Sanitizer::new(100))
        .with_avatar_storage(storage.clone(), Some(AVATAR_SECRET.to_string()));
    if let Some(url) = extraction_url {
        state = state.with_extractor(Arc::new(
            HttpTextExtractor::new(url, Duration::from_secs(2)).unwrap(),
        ));
    }

    let app = GatewayServer::build_with_middleware(state, access, limiter);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Small yield to let the server task start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{}", addr.port()),
        store,
        storage,
        http: reqwest::Client::new(),
    }
}

async fn seed(store: &InMemoryProfileStore, name: &str, industries: &[&str], role: PositionRole) {
    let mut p = Profile::new(ProfileInput {
        name: name.into(),
        email: format!("{name}@example.com"),
        industry_experience: industries.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    p.position_role = Some(role);
    store.insert(p).await.unwrap();
}

// ---------------------------------------------------------------------------
// Health and auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_endpoint() {
    let server = start_test_server(access(), None, None).await;
    let resp = server.get("/health", None).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "profilehub");
}

#[tokio::test]
async fn test_search_requires_key() {
    let server = start_test_server(access(), None, None).await;

    let resp = server
        .post("/search/natural", None)
        .json(&json!({"query": "금융"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .post("/search/natural", Some("wrong-key"))
        .json(&json!({"query": "금융"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_api_key_query_param() {
    let server = start_test_server(access(), None, None).await;
    let resp = server
        .http
        .get(server.url(&format!("/profiles?api_key={VIEWER_KEY}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_viewer_cannot_use_admin_routes() {
    let server = start_test_server(access(), None, None).await;
    let resp = server
        .get("/admin/profiles", Some(VIEWER_KEY))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_no_keys_means_open_access() {
    let server = start_test_server(AccessControl::default(), None, None).await;
    let resp = server.get("/admin/profiles", None).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_rate_limit_per_key() {
    let limiter = Arc::new(RateLimiter::new(RateLimits {
        requests_per_second: 0.01,
        burst: 2.0,
        anonymous_burst: 1.0,
    }));
    let server = start_test_server(access(), Some(limiter), None).await;

    for _ in 0..2 {
        let resp = server.get("/profiles", Some(VIEWER_KEY)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }
    let resp = server.get("/profiles", Some(VIEWER_KEY)).send().await.unwrap();
    assert_eq!(resp.status(), 429);
    let retry_after: u64 = resp.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // A different key has its own bucket.
    let resp = server.get("/profiles", Some(ADMIN_KEY)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_anonymous_callers_share_smaller_bucket() {
    let limiter = Arc::new(RateLimiter::new(RateLimits {
        requests_per_second: 0.01,
        burst: 5.0,
        anonymous_burst: 1.0,
    }));
    let server = start_test_server(access(), Some(limiter), None).await;

    let resp = server.get("/health", None).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let resp = server.get("/dashboard/stats", None).send().await.unwrap();
    assert_eq!(resp.status(), 429);

    // Keyed callers are charged to their own buckets.
    let resp = server.get("/dashboard/stats", Some(VIEWER_KEY)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_natural_search_structured_match() {
    let server = start_test_server(access(), None, None).await;
    seed(&server.store, "match", &["금융"], PositionRole::FrontendDeveloper).await;
    seed(&server.store, "other", &["제조"], PositionRole::Designer).await;

    let resp = server
        .post("/search/natural", Some(VIEWER_KEY))
        .json(&json!({"query": "금융권 프로젝트 경험이 있는 프론트엔드개발자"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["usedKeywordFallback"], true);
    assert_eq!(body["results"][0]["name"], "match");
    assert_eq!(body["results"][0]["match_score"], 85);
}

#[tokio::test]
async fn test_natural_search_empty_query_rejected_without_io() {
    let server = start_test_server(access(), None, None).await;

    for body in [json!({"query": ""}), json!({}), json!({"query": 7})] {
        let resp = server
            .post("/search/natural", Some(VIEWER_KEY))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let err: Value = resp.json().await.unwrap();
        assert!(err["error"].is_string());
    }
    assert_eq!(server.store.read_count(), 0);
}

#[tokio::test]
async fn test_natural_search_overlong_query_rejected() {
    let server = start_test_server(access(), None, None).await;
    let resp = server
        .post("/search/natural", Some(VIEWER_KEY))
        .json(&json!({"query": "가".repeat(101)}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_filter_search_overlap() {
    let server = start_test_server(access(), None, None).await;
    seed(&server.store, "fin", &["금융"], PositionRole::Planner).await;
    seed(&server.store, "shop", &["이커머스"], PositionRole::Planner).await;
    seed(&server.store, "factory", &["제조"], PositionRole::Planner).await;

    let resp = server
        .post("/search/filter", Some(VIEWER_KEY))
        .json(&json!({"industry_experience": ["금융", "이커머스"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);
    let results = body["results"].as_array().unwrap();
    assert!(results.iter().all(|r| r["match_score"] == 0));
    assert!(results.iter().all(|r| r["name"] != "factory"));
}

#[tokio::test]
async fn test_filter_search_unknown_enum_is_400() {
    let server = start_test_server(access(), None, None).await;
    let resp = server
        .post("/search/filter", Some(VIEWER_KEY))
        .json(&json!({"education": "유치원"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// ---------------------------------------------------------------------------
// Admin console
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_admin_profile_lifecycle() {
    let server = start_test_server(access(), None, None).await;

    let resp = server
        .post("/admin/profiles", Some(ADMIN_KEY))
        .json(&json!({
            "name": "김영희",
            "email": "younghee@example.com",
            "job_grade": "과장",
            "position_role": "designer",
            "industry_experience": ["금융"],
            "employment_history": ["A은행", "B증권"],
            "project_careers": ["모바일 뱅킹 리뉴얼"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["position_role"], "디자이너");
    assert_eq!(created["employment_history"].as_array().unwrap().len(), 2);

    // Duplicate email
    let resp = server
        .post("/admin/profiles", Some(ADMIN_KEY))
        .json(&json!({"name": "다른사람", "email": "younghee@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Replace-on-save of dependents
    let resp = server
        .http
        .put(server.url(&format!("/admin/profiles/{id}")))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({
            "name": "김영희",
            "email": "younghee@example.com",
            "employment_history": ["C카드"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["employment_history"].as_array().unwrap().len(), 1);
    assert_eq!(updated["employment_history"][0]["company_name"], "C카드");
    assert!(updated["project_careers"].as_array().unwrap().is_empty());

    // Viewer can read the detail page
    let resp = server
        .get(&format!("/profiles/{id}"), Some(VIEWER_KEY))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .http
        .delete(server.url(&format!("/admin/profiles/{id}")))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = server
        .get(&format!("/profiles/{id}"), Some(VIEWER_KEY))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_admin_create_validation() {
    let server = start_test_server(access(), None, None).await;
    for body in [
        json!({"name": "", "email": "a@example.com"}),
        json!({"name": "이름", "email": "not-an-email"}),
        json!({"name": "이름", "email": "a@example.com", "education": "유치원"}),
    ] {
        let resp = server
            .post("/admin/profiles", Some(ADMIN_KEY))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "body: {body}");
    }
}

#[tokio::test]
async fn test_update_missing_profile_is_404() {
    let server = start_test_server(access(), None, None).await;
    let resp = server
        .http
        .put(server.url(&format!("/admin/profiles/{}", uuid::Uuid::new_v4())))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({"name": "없음", "email": "none@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dashboard_blurred_for_anonymous() {
    let server = start_test_server(access(), None, None).await;
    seed(&server.store, "홍길동", &["금융", "Finance"], PositionRole::Planner).await;

    let body: Value = server
        .get("/dashboard/stats", None)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["blurred"], true);
    assert_eq!(body["total_profiles"], 1);
    assert_eq!(body["recent_updates"][0]["name"], "홍**");
    assert!(body["recent_updates"][0].get("email").is_none());

    let body: Value = server
        .get("/dashboard/stats", Some(VIEWER_KEY))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["blurred"], false);
    assert_eq!(body["recent_updates"][0]["name"], "홍길동");
    let finance = body["industries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["industry"] == "금융")
        .unwrap();
    assert_eq!(finance["count"], 1);
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

fn document_form(name: &str, mime: &str, bytes: &[u8]) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name(name.to_string())
        .mime_str(mime)
        .unwrap();
    reqwest::multipart::Form::new().part("file", part)
}

#[tokio::test]
async fn test_document_upload_forwards_to_extractor() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook/resume"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"profileId": "p-1"})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = start_test_server(
        access(),
        None,
        Some(format!("{}/webhook/resume", upstream.uri())),
    )
    .await;

    let resp = server
        .post("/admin/upload", Some(ADMIN_KEY))
        .multipart(document_form("resume.pdf", "application/pdf", b"%PDF-1.4"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["profileId"], "p-1");
}

#[tokio::test]
async fn test_document_upload_rejections() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
        .mount(&upstream)
        .await;
    let server = start_test_server(access(), None, Some(upstream.uri())).await;

    // Unsupported type
    let resp = server
        .post("/admin/upload", Some(ADMIN_KEY))
        .multipart(document_form("photo.png", "image/png", b"\x89PNG"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Empty file
    let resp = server
        .post("/admin/upload", Some(ADMIN_KEY))
        .multipart(document_form("empty.txt", "text/plain", b""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Upstream failure surfaces as 502 with its status
    let resp = server
        .post("/admin/upload", Some(ADMIN_KEY))
        .multipart(document_form("cv.txt", "text/plain", b"hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("500"));
    assert!(message.contains("workflow crashed"));
}

#[tokio::test]
async fn test_document_upload_without_extractor_is_500() {
    let server = start_test_server(access(), None, None).await;
    let resp = server
        .post("/admin/upload", Some(ADMIN_KEY))
        .multipart(document_form("cv.txt", "text/plain", b"hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn test_avatar_upload() {
    let server = start_test_server(access(), None, None).await;

    // Wrong secret
    let resp = server
        .post("/uploads/avatar", None)
        .header("x-n8n-avatar-secret", "nope")
        .json(&json!({"image": "aGk="}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Missing image
    let resp = server
        .post("/uploads/avatar", None)
        .header("x-n8n-avatar-secret", AVATAR_SECRET)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .post("/uploads/avatar", None)
        .header("x-n8n-avatar-secret", AVATAR_SECRET)
        .json(&json!({"image": "data:image/jpeg;base64,aGk=", "mimeType": "image/jpeg"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://cdn.test/avatars/"));
    assert!(url.ends_with(".jpg"));

    let name = url.rsplit('/').next().unwrap();
    let (content_type, bytes) = server.storage.get(name).await.unwrap();
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(bytes, b"hi");
}
