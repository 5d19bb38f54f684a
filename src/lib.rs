//! Reel-Harvester: a resumable social-media acquisition pipeline
//!
//! This crate crawls account profiles, short-video posts and follow edges from a
//! paginated, rate-limited API and downloads the referenced media, recording every
//! outcome in a durable status store so that an interrupted run resumes cleanly.

pub mod api;
pub mod config;
pub mod crawler;
pub mod download;
pub mod ingest;
pub mod output;
pub mod retry;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Reel-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Download error: {0}")]
    Download(#[from] download::DownloadError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The upstream session is assumed broken; the whole run must stop.
    #[error("Fatal error while {context}: {source}")]
    Fatal {
        context: String,
        source: api::ApiError,
    },
}

impl HarvestError {
    /// Returns true if this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("API token missing: set api.token or the {0} environment variable")]
    MissingToken(String),
}

/// Result type alias for Reel-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{CompletionFlag, PostStatus};
pub use storage::{SqliteStore, StatusStore};
