//! Statistics generation from the status store
//!
//! This module provides functionality for extracting and displaying
//! acquisition statistics from the storage layer.

use crate::state::{CompletionFlag, PostStatus};
use crate::storage::{RunRecord, StatusStore};
use crate::HarvestError;
use std::collections::HashMap;

/// Acquisition statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of ingested accounts
    pub total_accounts: u64,

    /// Accounts whose posts have been fetched
    pub reels_complete: u64,

    /// Accounts whose follow list has been fetched
    pub following_complete: u64,

    /// Accounts with at least one outstanding crawl phase
    pub pending_accounts: u64,

    /// Total number of stored posts
    pub total_posts: u64,

    /// Count of posts by download status
    pub posts_by_status: HashMap<PostStatus, u64>,

    /// Total number of follow edges
    pub follow_edges: u64,

    /// Most recent crawl or download run
    pub latest_run: Option<RunRecord>,
}

impl HarvestStatistics {
    pub fn posts_with_status(&self, status: PostStatus) -> u64 {
        self.posts_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The status store to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(store: &dyn StatusStore) -> Result<HarvestStatistics, HarvestError> {
    let total_accounts = store.count_accounts()?;
    let reels_complete = store.count_accounts_with_flag(CompletionFlag::Reels)?;
    let following_complete = store.count_accounts_with_flag(CompletionFlag::Following)?;
    let pending_accounts = store.get_pending_accounts()?.len() as u64;

    let mut posts_by_status = HashMap::new();
    for status in PostStatus::all() {
        posts_by_status.insert(status, store.count_posts_by_status(status)?);
    }
    let total_posts = posts_by_status.values().sum();

    Ok(HarvestStatistics {
        total_accounts,
        reels_complete,
        following_complete,
        pending_accounts,
        total_posts,
        posts_by_status,
        follow_edges: store.count_edges()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Wall-clock duration of a finished run, in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run
        .started_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Accounts:");
    println!("  Total: {}", stats.total_accounts);
    println!(
        "  Posts fetched: {} ({:.1}%)",
        stats.reels_complete,
        percentage(stats.reels_complete, stats.total_accounts)
    );
    println!(
        "  Following fetched: {} ({:.1}%)",
        stats.following_complete,
        percentage(stats.following_complete, stats.total_accounts)
    );
    println!("  Pending: {}", stats.pending_accounts);
    println!();

    println!("Posts:");
    println!("  Total: {}", stats.total_posts);
    for status in PostStatus::all() {
        let count = stats.posts_with_status(status);
        println!(
            "  {}: {} ({:.1}%)",
            status,
            count,
            percentage(count, stats.total_posts)
        );
    }
    println!();

    println!("Follow edges: {}", stats.follow_edges);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run:");
            println!("  #{} {} ({})", run.id, run.kind.to_db_string(), run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = run_duration_seconds(run) {
                println!("  Duration: {}s", seconds);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }
}
