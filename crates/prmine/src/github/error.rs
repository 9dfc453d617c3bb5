//! GitHub API error types.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the GitHub API.
///
/// Plain HTTP error statuses (404, 422, ...) are deliberately not
/// represented here: the fetch layer maps them to an absent result so
/// callers skip the unit of work instead of failing the harvest.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },

    #[error("rate limit still exhausted after {attempts} retries")]
    RateLimitExhausted { attempts: u32 },
}
