//! Bulk ingest of account handles
//!
//! One account per line, either a bare handle or a profile URL such as
//! `https://www.instagram.com/<handle>/`. Blank lines and `#` comments are
//! ignored.

use crate::storage::StatusStore;
use crate::Result;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

const PROFILE_HOST: &str = "instagram.com";

/// Counts from one ingest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Distinct handles read from the input
    pub read: usize,
    /// Handles that were not yet in the store
    pub inserted: usize,
}

/// Extracts a handle from one input line
///
/// # Returns
///
/// `None` for blank lines, comments, and URLs without a path
pub fn handle_from_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let candidate = match profile_url(line) {
        Some(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)?,
        None => line.to_string(),
    };

    let handle = candidate.trim_start_matches('@').trim();
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

/// Parses a profile URL, accepting the site host without a scheme
fn profile_url(line: &str) -> Option<Url> {
    match Url::parse(line) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Some(url),
        Ok(_) => None,
        Err(_) if line.contains(PROFILE_HOST) => Url::parse(&format!("https://{}", line)).ok(),
        Err(_) => None,
    }
}

/// Parses handles from text, preserving order and dropping duplicates
pub fn parse_handles(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .filter_map(handle_from_line)
        .filter(|handle| seen.insert(handle.clone()))
        .collect()
}

/// Reads a handle list file and inserts every new handle into the store
///
/// # Arguments
///
/// * `store` - The status store
/// * `path` - Path to the handle list
pub fn ingest_file(store: &mut dyn StatusStore, path: &Path) -> Result<IngestReport> {
    let text = std::fs::read_to_string(path)?;
    let handles = parse_handles(&text);
    let inserted = store.insert_handles(&handles)?;

    tracing::info!(
        "Ingested {} handles from {} ({} new)",
        handles.len(),
        path.display(),
        inserted
    );

    Ok(IngestReport {
        read: handles.len(),
        inserted,
    })
}
