//! Core types and error definitions for ProfileHub.
//!
//! This crate provides the foundational types shared across all ProfileHub crates:
//! the [`Profile`] aggregate with its dependent entities, the classification
//! enums used as search facets, and the unified error type.
//!
//! # Main types
//!
//! - [`ProfileHubError`]: Unified error enum for all ProfileHub subsystems.
//! - [`ProfileHubResult`]: Convenience alias for `Result<T, ProfileHubError>`.
//! - [`Profile`]: An employee/candidate profile, the aggregate root.
//! - [`ProfileInput`]: Create/update payload for the admin console.
//! - [`ProfileDetail`]: A profile together with its owned dependents.
//! - [`JobGrade`], [`Education`], [`PositionRole`]: Classification facets.

/// Profile aggregate, dependents, and classification enums.
pub mod profile;

pub use profile::{
    CapabilityScores, Education, EmploymentHistory, JobGrade, PositionRole, Profile,
    ProfileDetail, ProfileInput, ProjectCareer,
};

// --- Error types ---

/// Top-level error type for ProfileHub.
///
/// Each variant corresponds to a failure class the HTTP layer maps onto a
/// distinct status code.
#[derive(Debug, thiserror::Error)]
pub enum ProfileHubError {
    /// Malformed caller input, rejected before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (e.g. duplicate email).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A datastore query or write failed.
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// The embedding provider failed or returned an unusable response.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An outbound HTTP collaborator answered with a non-success status.
    #[error("Upstream error {status}: {message}")]
    Upstream {
        /// HTTP status returned by the collaborator.
        status: u16,
        /// Truncated response body or reason.
        message: String,
    },

    /// Object storage (avatar bucket) failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An operation exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ProfileHubError`].
pub type ProfileHubResult<T> = Result<T, ProfileHubError>;

impl ProfileHubError {
    /// Whether retrying the same read could plausibly succeed.
    ///
    /// Timeouts, transport failures, and 5xx responses are transient;
    /// validation, conflicts, and 4xx responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProfileHubError::Timeout(_) | ProfileHubError::Http(_) => true,
            ProfileHubError::Upstream { status, .. } => *status >= 500 || *status == 429,
            ProfileHubError::Datastore(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("connection")
                    || ["500", "502", "503", "504"]
                        .iter()
                        .any(|code| lower.contains(code))
            }
            _ => false,
        }
    }
}
