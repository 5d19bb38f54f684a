//! Storage traits and error types
//!
//! This module defines the trait interface for the status store and its
//! associated error types.

use crate::state::{CompletionFlag, PostStatus};
use crate::storage::{
    AccountRecord, FollowEdge, PostRecord, ProfileRecord, RunKind, RunRecord, RunStatus,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The durable status store
///
/// Every component reads and writes acquisition state through this trait.
/// All writes are single-row or single-batch upserts keyed by account handle
/// or post id, so a crash between two calls never leaves a row half-updated.
pub trait StatusStore {
    // ===== Accounts =====

    /// Inserts bare handles (bulk ingest); existing handles are left untouched
    ///
    /// # Returns
    ///
    /// The number of handles that were newly inserted
    fn insert_handles(&mut self, handles: &[String]) -> StorageResult<usize>;

    /// Gets an account by handle
    fn get_account(&self, handle: &str) -> StorageResult<Option<AccountRecord>>;

    /// Gets accounts with at least one false completion flag, in insertion order
    fn get_pending_accounts(&self) -> StorageResult<Vec<AccountRecord>>;

    /// Inserts or updates an account's profile attributes, keyed by handle
    ///
    /// Completion flags are never touched by this call.
    fn upsert_profile(&mut self, profile: &ProfileRecord) -> StorageResult<()>;

    /// Sets one completion flag for an account
    fn mark_flag(&mut self, handle: &str, flag: CompletionFlag, value: bool) -> StorageResult<()>;

    /// Clears both completion flags, the selected set and the account's posts
    fn reset_account(&mut self, handle: &str) -> StorageResult<()>;

    // ===== Posts =====

    /// Inserts or updates posts for one owner
    ///
    /// On conflict only the engagement counters are updated; download flags
    /// and URLs of existing rows are preserved.
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn upsert_posts(&mut self, owner_id: &str, posts: &[PostRecord]) -> StorageResult<usize>;

    /// Gets a post by id
    fn get_post(&self, post_id: &str) -> StorageResult<Option<PostRecord>>;

    /// Counts the posts owned by an account id
    fn count_posts_for_owner(&self, owner_id: &str) -> StorageResult<u64>;

    /// Marks a post downloaded unless it is already unavailable
    ///
    /// # Returns
    ///
    /// `true` if the row changed
    fn mark_downloaded(&mut self, post_id: &str) -> StorageResult<bool>;

    /// Marks a post unavailable unless it is already downloaded
    fn mark_unavailable(&mut self, post_id: &str) -> StorageResult<bool>;

    /// Returns the ids of the `n` most played posts of an owner
    fn select_top_posts(&self, owner_id: &str, n: usize) -> StorageResult<Vec<String>>;

    // ===== Selected posts =====

    /// Replaces an account's selected set, preserving the given order as rank
    fn set_selected_posts(&mut self, handle: &str, post_ids: &[String]) -> StorageResult<()>;

    /// Gets an account's selected post ids in rank order
    fn get_selected_posts(&self, handle: &str) -> StorageResult<Vec<String>>;

    /// Gets accounts that have a non-empty selected set, in insertion order
    fn get_accounts_with_selection(&self) -> StorageResult<Vec<AccountRecord>>;

    /// Gets an account's selected posts that are neither downloaded nor unavailable
    fn get_pending_selected_posts(&self, handle: &str) -> StorageResult<Vec<PostRecord>>;

    /// Gets accounts that own posts but have no selected set
    fn get_accounts_missing_selection(&self) -> StorageResult<Vec<AccountRecord>>;

    // ===== Follow edges =====

    /// Inserts follow edges, silently skipping duplicates
    ///
    /// # Returns
    ///
    /// The number of edges that were new
    fn insert_edges_ignore_duplicates(&mut self, edges: &[FollowEdge]) -> StorageResult<usize>;

    /// Counts the edges whose follower is the given account id
    fn count_edges_for(&self, follower_id: &str) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new run in the `running` state
    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets a terminal status and finish timestamp on a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Statistics =====

    /// Gets total account count
    fn count_accounts(&self) -> StorageResult<u64>;

    /// Counts accounts whose given flag is set
    fn count_accounts_with_flag(&self, flag: CompletionFlag) -> StorageResult<u64>;

    /// Counts posts in a given download status
    fn count_posts_by_status(&self, status: PostStatus) -> StorageResult<u64>;

    /// Counts the total number of follow edges
    fn count_edges(&self) -> StorageResult<u64>;
}
