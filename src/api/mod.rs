//! Social API module
//!
//! This module defines the paginated resource API the crawler talks to:
//! - `SocialApi`: the trait the entity fetcher and account processor depend on
//! - `HttpSocialApi`: the HTTP implementation
//! - Tagged results for terminal-but-expected outcomes (`PageOutcome`, `ProfileLookup`)

mod client;
mod types;

pub use client::{build_api_client, HttpSocialApi};
pub use types::{Caption, ClipMedia, FollowedUser, ImageVersions, MediaVersion, Profile};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a single API request
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{endpoint} returned an unreadable body: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether another attempt might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Status { .. } | Self::Decode { .. } => true,
            Self::Url(_) => false,
        }
    }
}

/// Result of requesting one page of a paginated resource
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome<T> {
    /// A page of items; `next_page_id` is `None` on the last page
    Page {
        items: Vec<T>,
        next_page_id: Option<String>,
    },

    /// The response carried no page at all (missing or malformed body)
    Done,
}

/// Result of a profile lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(Profile),
    NotFound,
}

/// Paginated social API
///
/// Implementations return `Err` only for failures worth retrying or for
/// configuration mistakes; "no more pages" and "not found" are tagged results.
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Looks up an account profile by handle
    async fn user_by_handle(&self, handle: &str) -> Result<ProfileLookup, ApiError>;

    /// Requests one page of an account's short-video posts
    async fn user_clips(
        &self,
        user_id: &str,
        page_id: Option<&str>,
    ) -> Result<PageOutcome<ClipMedia>, ApiError>;

    /// Requests one page of the accounts followed by `user_id`
    async fn user_following(
        &self,
        user_id: &str,
        page_id: Option<&str>,
    ) -> Result<PageOutcome<FollowedUser>, ApiError>;
}
