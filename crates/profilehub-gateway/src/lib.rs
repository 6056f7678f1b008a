//! HTTP gateway for ProfileHub.
//!
//! Serves the natural-language and filter search endpoints, profile
//! browsing, the admin console, dashboard statistics, and the two upload
//! proxies, behind API-key authentication and per-key rate limiting.

/// Profile CRUD for the admin console.
pub mod admin;
/// Dashboard statistics.
pub mod dashboard;
/// HTTP error mapping.
pub mod error;
/// Document-to-text extraction client.
pub mod extraction;
/// Authentication and rate-limit middleware.
pub mod middleware;
/// Read-only profile browsing.
pub mod profiles;
/// Search endpoints.
pub mod search;
/// Router assembly and shared state.
pub mod server;
/// Avatar object storage.
pub mod storage;
/// Document and avatar upload endpoints.
pub mod upload;

pub use error::ApiError;
pub use extraction::{Document, HttpTextExtractor, TextExtractor};
pub use middleware::Caller;
pub use server::{AppState, GatewayServer};
pub use storage::{InMemoryStorage, ObjectStorage, SupabaseStorage};
