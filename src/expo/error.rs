//! Error types for page fetching and traversal.

use crate::expo::selectors::{PageKind, Role};
use thiserror::Error;

/// A single page fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted { url: String, attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Exhausted { .. } => false,
        }
    }
}

/// Why a traversal branch could not be completed.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// Expected page structure is missing; the layout has diverged.
    #[error("navigation error on {page} page: nothing matched {role} ('{selector}')")]
    Navigation { page: PageKind, role: Role, selector: String },

    /// The page reached is not the one the link promised.
    #[error("consistency error at {url}: expected heading '{expected}', found '{found}'")]
    Consistency { url: String, expected: String, found: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
