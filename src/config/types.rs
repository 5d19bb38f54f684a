use crate::retry::{Backoff, DelayRange, RetryPolicy};
use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Reel-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    pub output: OutputConfig,
}

/// Connection settings for the paginated social API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Base URL of the API (e.g. "https://api.hikerapi.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access token; when absent the token is read from `token_env`
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Resolves the access token from the config or the environment
    pub fn resolve_token(&self) -> ConfigResult<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.clone());
        }

        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken(self.token_env.clone())),
        }
    }
}

/// How successive retry delays grow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Retry settings for paginated API requests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (base delay for exponential backoff)
    #[serde(default = "default_retry_delay")]
    pub delay_secs: u64,

    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,

    /// Upper bound for exponential backoff
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_retry_delay(),
            backoff: default_backoff(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Builds the retry policy injected into the entity fetcher
    pub fn to_policy(&self) -> RetryPolicy {
        let base = Duration::from_secs(self.delay_secs);
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                max: Duration::from_secs(self.max_delay_secs),
            },
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

/// Crawl policy thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyConfig {
    /// Number of posts to fetch per account
    #[serde(default = "default_reels_to_fetch")]
    pub reels_to_fetch: usize,

    /// Accounts following more than this many users are not crawled deeply
    #[serde(default = "default_max_following")]
    pub max_following: i64,

    /// Accounts with fewer followers than this are not crawled deeply
    #[serde(default = "default_min_followers")]
    pub min_followers: i64,

    /// Size of each account's selected set
    #[serde(default = "default_top_posts")]
    pub top_posts: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reels_to_fetch: default_reels_to_fetch(),
            max_following: default_max_following(),
            min_followers: default_min_followers(),
            top_posts: default_top_posts(),
        }
    }
}

/// Politeness delays for the crawl path (milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_page_delay_min")]
    pub page_delay_min_ms: u64,

    #[serde(default = "default_page_delay_max")]
    pub page_delay_max_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay_ms(),
            page_delay_min_ms: default_page_delay_min(),
            page_delay_max_ms: default_page_delay_max(),
        }
    }
}

impl SchedulerConfig {
    pub fn account_delay(&self) -> DelayRange {
        DelayRange::from_millis(self.min_delay_ms, self.max_delay_ms)
    }

    pub fn page_delay(&self) -> DelayRange {
        DelayRange::from_millis(self.page_delay_min_ms, self.page_delay_max_ms)
    }
}

/// Media download settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DownloadConfig {
    /// Transfers issued together in one batch
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Consecutive failures that trip the circuit breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Pause after the circuit breaker trips
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: PathBuf,

    #[serde(default = "default_avatar_dir")]
    pub avatar_dir: PathBuf,

    /// Write buffer size for streamed media, in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Attempts per media transfer before it counts as a failure
    #[serde(default = "default_transfer_attempts")]
    pub transfer_attempts: u32,

    #[serde(default = "default_transfer_retry_delay")]
    pub transfer_retry_delay_secs: u64,

    #[serde(default = "default_avatar_attempts")]
    pub avatar_attempts: u32,

    #[serde(default = "default_avatar_retry_delay")]
    pub avatar_retry_delay_secs: u64,

    #[serde(default = "default_account_delay_min")]
    pub account_delay_min_ms: u64,

    #[serde(default = "default_account_delay_max")]
    pub account_delay_max_ms: u64,

    /// Per-transfer timeout in seconds
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown(),
            media_dir: default_media_dir(),
            thumbnail_dir: default_thumbnail_dir(),
            avatar_dir: default_avatar_dir(),
            chunk_size: default_chunk_size(),
            transfer_attempts: default_transfer_attempts(),
            transfer_retry_delay_secs: default_transfer_retry_delay(),
            avatar_attempts: default_avatar_attempts(),
            avatar_retry_delay_secs: default_avatar_retry_delay(),
            account_delay_min_ms: default_account_delay_min(),
            account_delay_max_ms: default_account_delay_max(),
            timeout_secs: default_download_timeout(),
        }
    }
}

impl DownloadConfig {
    pub fn transfer_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.transfer_attempts,
            Duration::from_secs(self.transfer_retry_delay_secs),
        )
    }

    pub fn avatar_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.avatar_attempts,
            Duration::from_secs(self.avatar_retry_delay_secs),
        )
    }

    pub fn account_delay(&self) -> DelayRange {
        DelayRange::from_millis(self.account_delay_min_ms, self.account_delay_max_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite status database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_base_url() -> String {
    "https://api.hikerapi.com".to_string()
}

fn default_token_env() -> String {
    "HIKER_API_TOKEN".to_string()
}

fn default_api_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    30
}

fn default_backoff() -> BackoffKind {
    BackoffKind::Fixed
}

fn default_max_delay() -> u64 {
    300
}

fn default_reels_to_fetch() -> usize {
    60
}

fn default_max_following() -> i64 {
    1001
}

fn default_min_followers() -> i64 {
    10_000
}

fn default_top_posts() -> usize {
    5
}

fn default_min_delay() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    200
}

fn default_page_delay_min() -> u64 {
    300
}

fn default_page_delay_max() -> u64 {
    1200
}

fn default_max_concurrent() -> usize {
    5
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown() -> u64 {
    3
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("data/reels")
}

fn default_thumbnail_dir() -> PathBuf {
    PathBuf::from("data/thumbnails")
}

fn default_avatar_dir() -> PathBuf {
    PathBuf::from("data/avatars")
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_transfer_attempts() -> u32 {
    1
}

fn default_transfer_retry_delay() -> u64 {
    5
}

fn default_avatar_attempts() -> u32 {
    3
}

fn default_avatar_retry_delay() -> u64 {
    3
}

fn default_account_delay_min() -> u64 {
    2000
}

fn default_account_delay_max() -> u64 {
    3000
}

fn default_download_timeout() -> u64 {
    120
}
