//! Storage module: the durable status store
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Account profiles and their completion flags
//! - Posts and their download/unavailable flags
//! - Follow edges (append-only, duplicate-free)
//! - Selected post sets consumed by later pipeline stages
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use schema::{get_schema_version, initialize_schema};
pub use sqlite::SqliteStore;
pub use traits::{StatusStore, StorageError, StorageResult};

use crate::state::PostStatus;
use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a status store
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> Result<SqliteStore, HarvestError> {
    SqliteStore::new(path)
}

/// Represents an account row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub handle: String,
    /// Stable numeric id; unknown until the profile has been fetched once
    pub account_id: Option<String>,
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub follower_count: Option<i64>,
    pub following_count: Option<i64>,
    pub profile_pic_url: Option<String>,
    pub profile_url: Option<String>,
    pub reels_complete: bool,
    pub following_complete: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl AccountRecord {
    /// Returns true if at least one crawl phase is still outstanding
    pub fn is_pending(&self) -> bool {
        !(self.reels_complete && self.following_complete)
    }
}

/// Profile attributes written by `upsert_profile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub handle: String,
    pub account_id: String,
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub profile_pic_url: Option<String>,
    pub profile_url: String,
}

/// Represents a post (reel) row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: String,
    pub owner_id: String,
    pub code: Option<String>,
    pub caption: Option<String>,
    pub taken_at: Option<i64>,
    pub play_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub downloaded: bool,
    pub unavailable: bool,
}

impl PostRecord {
    pub fn status(&self) -> PostStatus {
        PostStatus::from_flags(self.downloaded, self.unavailable)
    }
}

/// A directed follow relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FollowEdge {
    pub follower_id: String,
    pub followed_id: String,
    pub followed_handle: Option<String>,
}

/// Represents a harvester run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: RunKind,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// What a run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Crawl,
    Download,
}

impl RunKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Download => "download",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "crawl" => Some(Self::Crawl),
            "download" => Some(Self::Download),
            _ => None,
        }
    }
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal status for a run whose work ended with `outcome`
    ///
    /// `None` means the work was cancelled before finishing.
    pub fn from_outcome<T, E>(outcome: Option<&std::result::Result<T, E>>) -> Self {
        match outcome {
            None => Self::Interrupted,
            Some(Ok(_)) => Self::Completed,
            Some(Err(_)) => Self::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let parsed = RunStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
        assert_eq!(RunKind::from_db_string("invalid"), None);
    }

    #[test]
    fn test_run_status_from_outcome() {
        let ok: std::result::Result<(), String> = Ok(());
        let err: std::result::Result<(), String> = Err("boom".to_string());
        assert_eq!(RunStatus::from_outcome(Some(&ok)), RunStatus::Completed);
        assert_eq!(RunStatus::from_outcome(Some(&err)), RunStatus::Failed);
        assert_eq!(
            RunStatus::from_outcome::<(), String>(None),
            RunStatus::Interrupted
        );
    }

    #[test]
    fn test_account_is_pending() {
        let mut account = AccountRecord {
            handle: "alice".to_string(),
            account_id: None,
            full_name: None,
            biography: None,
            follower_count: None,
            following_count: None,
            profile_pic_url: None,
            profile_url: None,
            reels_complete: false,
            following_complete: false,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: None,
        };
        assert!(account.is_pending());

        account.reels_complete = true;
        assert!(account.is_pending());

        account.following_complete = true;
        assert!(!account.is_pending());
    }
}
