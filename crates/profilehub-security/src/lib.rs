//! Security primitives for ProfileHub.
//!
//! Provides API-key access control, rate limiting, input sanitization, and
//! constant-time secret comparison used by the gateway.
//!
//! # Main types
//!
//! - [`AccessControl`]: Maps API keys to roles.
//! - [`Role`]: What a caller may do: browse or administer.
//! - [`RateLimiter`]: Token buckets per API key plus a shared anonymous bucket.
//! - [`Sanitizer`]: Input sanitization utilities.

/// API keys and roles.
pub mod access;
/// Token-bucket rate limiting.
pub mod rate_limit;
/// Input sanitization utilities.
pub mod sanitizer;
/// Constant-time comparison of shared secrets.
pub mod secret;

pub use access::{AccessControl, ApiKeyEntry, Role};
pub use rate_limit::{BucketKey, RateDecision, RateLimiter, RateLimits};
pub use sanitizer::{SanitizeResult, Sanitizer};
pub use secret::constant_time_eq;
