//! HTTP implementation of the social API
//!
//! Every request carries the `x-access-key` header. Page bodies are parsed
//! leniently: a body without the expected list is reported as
//! `PageOutcome::Done` instead of an error, and individual malformed items are
//! skipped with a warning.

use super::types::{ClipMedia, FollowedUser, Profile};
use super::{ApiError, PageOutcome, ProfileLookup, SocialApi};
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const PROFILE_PATH: &str = "v2/user/by/username";
const CLIPS_PATH: &str = "v2/user/clips";
const FOLLOWING_PATH: &str = "v2/user/following";

const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Builds the HTTP client used for API requests
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_api_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Social API client speaking the v2 JSON endpoints
pub struct HttpSocialApi {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpSocialApi {
    /// Creates a client for the API rooted at `base_url`
    pub fn new(client: Client, base_url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        // Url::join drops the last path segment unless the base ends in '/'
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            token: token.into(),
        })
    }

    fn endpoint_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, ApiError> {
        let url = self.endpoint_url(path, query)?;
        tracing::debug!("GET {}", url);

        self.client
            .get(url)
            .header(ACCESS_KEY_HEADER, &self.token)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: path.to_string(),
                source,
            })
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        list_key: &str,
        extract: fn(&Value) -> Option<&Value>,
    ) -> Result<PageOutcome<T>, ApiError> {
        let response = self.send(path, query).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| ApiError::Transport {
            endpoint: path.to_string(),
            source,
        })?;

        Ok(parse_page(path, &body, list_key, extract))
    }
}

fn page_query<'a>(user_id: &'a str, page_id: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    let mut query = vec![("user_id", user_id)];
    if let Some(page_id) = page_id {
        query.push(("page_id", page_id));
    }
    query
}

fn clip_media(entry: &Value) -> Option<&Value> {
    entry.get("media")
}

fn as_is(entry: &Value) -> Option<&Value> {
    Some(entry)
}

/// Reads the cursor for the following page; empty or null means last page
fn next_page_id(value: &Value) -> Option<String> {
    match value.get("next_page_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses `{response: {<list_key>: [...]}, next_page_id}`
fn parse_page<T: DeserializeOwned>(
    endpoint: &str,
    body: &[u8],
    list_key: &str,
    extract: fn(&Value) -> Option<&Value>,
) -> PageOutcome<T> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("{}: malformed page body: {}", endpoint, e);
            return PageOutcome::Done;
        }
    };

    let Some(entries) = value
        .get("response")
        .and_then(|response| response.get(list_key))
        .and_then(Value::as_array)
    else {
        tracing::debug!("{}: response carries no '{}' list", endpoint, list_key);
        return PageOutcome::Done;
    };

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(inner) = extract(entry) else {
            continue;
        };
        match T::deserialize(inner) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("{}: skipping malformed item: {}", endpoint, e),
        }
    }

    PageOutcome::Page {
        items,
        next_page_id: next_page_id(&value),
    }
}

/// Interprets a profile lookup body
fn parse_profile(body: &[u8]) -> Result<ProfileLookup, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;

    if value.get("exc_type").and_then(Value::as_str) == Some("UserNotFound") {
        return Ok(ProfileLookup::NotFound);
    }

    match value.get("user") {
        None | Some(Value::Null) => Ok(ProfileLookup::NotFound),
        Some(user) => Profile::deserialize(user).map(ProfileLookup::Found),
    }
}

#[async_trait]
impl SocialApi for HttpSocialApi {
    async fn user_by_handle(&self, handle: &str) -> Result<ProfileLookup, ApiError> {
        let response = self.send(PROFILE_PATH, &[("username", handle)]).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(ProfileLookup::NotFound);
        }

        let body = response.bytes().await.map_err(|source| ApiError::Transport {
            endpoint: PROFILE_PATH.to_string(),
            source,
        })?;

        if !status.is_success() {
            // Some deployments report a missing user with a 4xx and a typed body
            if matches!(parse_profile(&body), Ok(ProfileLookup::NotFound))
                && status.is_client_error()
            {
                return Ok(ProfileLookup::NotFound);
            }
            return Err(ApiError::Status {
                endpoint: PROFILE_PATH.to_string(),
                status: status.as_u16(),
            });
        }

        parse_profile(&body).map_err(|source| ApiError::Decode {
            endpoint: PROFILE_PATH.to_string(),
            source,
        })
    }

    async fn user_clips(
        &self,
        user_id: &str,
        page_id: Option<&str>,
    ) -> Result<PageOutcome<ClipMedia>, ApiError> {
        let query = page_query(user_id, page_id);
        self.fetch_page(CLIPS_PATH, &query, "items", clip_media)
            .await
    }

    async fn user_following(
        &self,
        user_id: &str,
        page_id: Option<&str>,
    ) -> Result<PageOutcome<FollowedUser>, ApiError> {
        let query = page_query(user_id, page_id);
        self.fetch_page(FOLLOWING_PATH, &query, "users", as_is)
            .await
    }
}
