//! Error types for the pricing pipeline.

use thiserror::Error;

/// Unified error type for source fetch operations.
///
/// These errors stay internal to the fallback chains: the public pricing
/// surfaces translate them into sentinel quotes carrying a diagnostic
/// note instead of propagating them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse a JSON response
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Upstream signalled throttling (429 or provider-specific)
    #[error("rate limited by upstream")]
    RateLimited,
    /// A required credential is not configured
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    /// No matching catalog entry or candidate
    #[error("no match: {0}")]
    NotFound(String),
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, FetchError>;
