//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Reel-Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvester runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Accounts: identity, profile attributes and completion flags
CREATE TABLE IF NOT EXISTS accounts (
    handle TEXT PRIMARY KEY,
    account_id TEXT,
    full_name TEXT,
    biography TEXT,
    follower_count INTEGER,
    following_count INTEGER,
    profile_pic_url TEXT,
    profile_url TEXT,
    reels_complete INTEGER NOT NULL DEFAULT 0,
    following_complete INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_accounts_flags ON accounts(reels_complete, following_complete);
CREATE INDEX IF NOT EXISTS idx_accounts_account_id ON accounts(account_id);

-- Posts (reels) with their download outcome flags
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    code TEXT,
    caption TEXT,
    taken_at INTEGER,
    play_count INTEGER NOT NULL DEFAULT 0,
    like_count INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0,
    video_url TEXT,
    thumbnail_url TEXT,
    downloaded INTEGER NOT NULL DEFAULT 0,
    unavailable INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL,
    downloaded_at TEXT,
    CHECK (NOT (downloaded = 1 AND unavailable = 1))
);

CREATE INDEX IF NOT EXISTS idx_posts_owner ON posts(owner_id);
CREATE INDEX IF NOT EXISTS idx_posts_play_count ON posts(owner_id, play_count DESC);

-- Follow graph (append-only)
CREATE TABLE IF NOT EXISTS follow_edges (
    follower_id TEXT NOT NULL,
    followed_id TEXT NOT NULL,
    followed_handle TEXT,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (follower_id, followed_id)
);

CREATE INDEX IF NOT EXISTS idx_follow_edges_followed ON follow_edges(followed_id);

-- Selected posts per account, consumed by downstream stages
CREATE TABLE IF NOT EXISTS selected_posts (
    handle TEXT NOT NULL REFERENCES accounts(handle) ON DELETE CASCADE,
    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    rank INTEGER NOT NULL,
    PRIMARY KEY (handle, post_id)
);

CREATE INDEX IF NOT EXISTS idx_selected_posts_post ON selected_posts(post_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", get_schema_version())?;
    Ok(())
}

/// Gets the current schema version
///
/// Stored in `PRAGMA user_version` so future migrations can detect old files.
pub fn get_schema_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "accounts", "posts", "follow_edges", "selected_posts"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_schema_version_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, get_schema_version());
    }

    #[test]
    fn test_post_flags_are_mutually_exclusive() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO posts (id, owner_id, downloaded, unavailable, fetched_at)
             VALUES ('1', '2', 1, 1, 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
