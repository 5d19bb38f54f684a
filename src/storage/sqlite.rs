//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StatusStore trait.

use crate::state::{CompletionFlag, PostStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StatusStore, StorageError, StorageResult};
use crate::storage::{
    AccountRecord, FollowEdge, PostRecord, ProfileRecord, RunKind, RunRecord, RunStatus,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const ACCOUNT_COLUMNS: &str = "a.handle, a.account_id, a.full_name, a.biography, a.follower_count,
     a.following_count, a.profile_pic_url, a.profile_url, a.reels_complete,
     a.following_complete, a.created_at, a.updated_at";

const POST_COLUMNS: &str = "p.id, p.owner_id, p.code, p.caption, p.taken_at, p.play_count,
     p.like_count, p.comment_count, p.video_url, p.thumbnail_url, p.downloaded, p.unavailable";

const RUN_COLUMNS: &str = "id, kind, started_at, finished_at, config_hash, status";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_accounts(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Vec<AccountRecord>> {
        let sql = format!(
            "SELECT {} FROM accounts a {} ORDER BY a.rowid ASC",
            ACCOUNT_COLUMNS, where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let accounts = stmt
            .query_map(params, account_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn count(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        handle: row.get(0)?,
        account_id: row.get(1)?,
        full_name: row.get(2)?,
        biography: row.get(3)?,
        follower_count: row.get(4)?,
        following_count: row.get(5)?,
        profile_pic_url: row.get(6)?,
        profile_url: row.get(7)?,
        reels_complete: row.get(8)?,
        following_complete: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        code: row.get(2)?,
        caption: row.get(3)?,
        taken_at: row.get(4)?,
        play_count: row.get(5)?,
        like_count: row.get(6)?,
        comment_count: row.get(7)?,
        video_url: row.get(8)?,
        thumbnail_url: row.get(9)?,
        downloaded: row.get(10)?,
        unavailable: row.get(11)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: RunKind::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunKind::Crawl),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl StatusStore for SqliteStore {
    // ===== Accounts =====

    fn insert_handles(&mut self, handles: &[String]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO accounts (handle, created_at) VALUES (?1, ?2)")?;
            for handle in handles {
                inserted += stmt.execute(params![handle, now])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get_account(&self, handle: &str) -> StorageResult<Option<AccountRecord>> {
        let sql = format!("SELECT {} FROM accounts a WHERE a.handle = ?1", ACCOUNT_COLUMNS);
        let account = self
            .conn
            .query_row(&sql, params![handle], account_from_row)
            .optional()?;
        Ok(account)
    }

    fn get_pending_accounts(&self) -> StorageResult<Vec<AccountRecord>> {
        self.query_accounts(
            "WHERE a.reels_complete = 0 OR a.following_complete = 0",
            &[],
        )
    }

    fn upsert_profile(&mut self, profile: &ProfileRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO accounts (handle, account_id, full_name, biography, follower_count,
                 following_count, profile_pic_url, profile_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(handle) DO UPDATE SET
                 account_id = excluded.account_id,
                 full_name = excluded.full_name,
                 biography = excluded.biography,
                 follower_count = excluded.follower_count,
                 following_count = excluded.following_count,
                 profile_pic_url = excluded.profile_pic_url,
                 profile_url = excluded.profile_url,
                 updated_at = excluded.updated_at",
            params![
                profile.handle,
                profile.account_id,
                profile.full_name,
                profile.biography,
                profile.follower_count,
                profile.following_count,
                profile.profile_pic_url,
                profile.profile_url,
                now,
            ],
        )?;
        Ok(())
    }

    fn mark_flag(&mut self, handle: &str, flag: CompletionFlag, value: bool) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let sql = format!(
            "UPDATE accounts SET {} = ?1, updated_at = ?2 WHERE handle = ?3",
            flag.column()
        );
        let changed = self.conn.execute(&sql, params![value, now, handle])?;
        if changed == 0 {
            return Err(StorageError::AccountNotFound(handle.to_string()));
        }
        Ok(())
    }

    fn reset_account(&mut self, handle: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let account_id: Option<String> = tx
            .query_row(
                "SELECT account_id FROM accounts WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::AccountNotFound(handle.to_string()))?;

        tx.execute(
            "DELETE FROM selected_posts WHERE handle = ?1",
            params![handle],
        )?;
        if let Some(account_id) = &account_id {
            tx.execute(
                "DELETE FROM selected_posts WHERE post_id IN
                     (SELECT id FROM posts WHERE owner_id = ?1)",
                params![account_id],
            )?;
            tx.execute("DELETE FROM posts WHERE owner_id = ?1", params![account_id])?;
        }
        tx.execute(
            "UPDATE accounts SET reels_complete = 0, following_complete = 0, updated_at = ?1
             WHERE handle = ?2",
            params![now, handle],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ===== Posts =====

    fn upsert_posts(&mut self, owner_id: &str, posts: &[PostRecord]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO posts (id, owner_id, code, caption, taken_at, play_count, like_count,
                     comment_count, video_url, thumbnail_url, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                     play_count = excluded.play_count,
                     like_count = excluded.like_count,
                     comment_count = excluded.comment_count",
            )?;
            for post in posts {
                written += stmt.execute(params![
                    post.id,
                    owner_id,
                    post.code,
                    post.caption,
                    post.taken_at,
                    post.play_count,
                    post.like_count,
                    post.comment_count,
                    post.video_url,
                    post.thumbnail_url,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn get_post(&self, post_id: &str) -> StorageResult<Option<PostRecord>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS);
        let post = self
            .conn
            .query_row(&sql, params![post_id], post_from_row)
            .optional()?;
        Ok(post)
    }

    fn count_posts_for_owner(&self, owner_id: &str) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM posts WHERE owner_id = ?1",
            &[&owner_id],
        )
    }

    fn mark_downloaded(&mut self, post_id: &str) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE posts SET downloaded = 1, downloaded_at = ?1
             WHERE id = ?2 AND downloaded = 0 AND unavailable = 0",
            params![now, post_id],
        )?;
        Ok(changed > 0)
    }

    fn mark_unavailable(&mut self, post_id: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE posts SET unavailable = 1
             WHERE id = ?1 AND downloaded = 0 AND unavailable = 0",
            params![post_id],
        )?;
        Ok(changed > 0)
    }

    fn select_top_posts(&self, owner_id: &str, n: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM posts WHERE owner_id = ?1
             ORDER BY play_count DESC, id ASC LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![owner_id, n as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    // ===== Selected posts =====

    fn set_selected_posts(&mut self, handle: &str, post_ids: &[String]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM selected_posts WHERE handle = ?1",
            params![handle],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO selected_posts (handle, post_id, rank) VALUES (?1, ?2, ?3)",
            )?;
            for (rank, post_id) in post_ids.iter().enumerate() {
                stmt.execute(params![handle, post_id, rank as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_selected_posts(&self, handle: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT post_id FROM selected_posts WHERE handle = ?1 ORDER BY rank ASC")?;
        let ids = stmt
            .query_map(params![handle], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn get_accounts_with_selection(&self) -> StorageResult<Vec<AccountRecord>> {
        self.query_accounts(
            "WHERE EXISTS (SELECT 1 FROM selected_posts s WHERE s.handle = a.handle)",
            &[],
        )
    }

    fn get_pending_selected_posts(&self, handle: &str) -> StorageResult<Vec<PostRecord>> {
        let sql = format!(
            "SELECT {} FROM selected_posts s JOIN posts p ON p.id = s.post_id
             WHERE s.handle = ?1 AND p.downloaded = 0 AND p.unavailable = 0
             ORDER BY s.rank ASC",
            POST_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![handle], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn get_accounts_missing_selection(&self) -> StorageResult<Vec<AccountRecord>> {
        self.query_accounts(
            "WHERE a.account_id IS NOT NULL
               AND EXISTS (SELECT 1 FROM posts p WHERE p.owner_id = a.account_id)
               AND NOT EXISTS (SELECT 1 FROM selected_posts s WHERE s.handle = a.handle)",
            &[],
        )
    }

    // ===== Follow edges =====

    fn insert_edges_ignore_duplicates(&mut self, edges: &[FollowEdge]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO follow_edges
                     (follower_id, followed_id, followed_handle, discovered_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for edge in edges {
                inserted += stmt.execute(params![
                    edge.follower_id,
                    edge.followed_id,
                    edge.followed_handle,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn count_edges_for(&self, follower_id: &str) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM follow_edges WHERE follower_id = ?1",
            &[&follower_id],
        )
    }

    // ===== Run Management =====

    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_accounts(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM accounts", &[])
    }

    fn count_accounts_with_flag(&self, flag: CompletionFlag) -> StorageResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM accounts WHERE {} = 1", flag.column());
        self.count(&sql, &[])
    }

    fn count_posts_by_status(&self, status: PostStatus) -> StorageResult<u64> {
        let sql = match status {
            PostStatus::Pending => {
                "SELECT COUNT(*) FROM posts WHERE downloaded = 0 AND unavailable = 0"
            }
            PostStatus::Downloaded => "SELECT COUNT(*) FROM posts WHERE downloaded = 1",
            PostStatus::Unavailable => "SELECT COUNT(*) FROM posts WHERE unavailable = 1",
        };
        self.count(sql, &[])
    }

    fn count_edges(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM follow_edges", &[])
    }
}
