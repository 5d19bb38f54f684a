//! Concurrency-bounded media downloader
//!
//! Work-lists are processed in batches of `max_concurrent`. Every transfer in
//! a batch runs concurrently and the batch is joined before any store write;
//! results are then classified in work-list order through the circuit breaker.

use super::breaker::CircuitBreaker;
use super::error::DownloadError;
use super::media::{classify, MediaSource};
use crate::config::DownloadConfig;
use crate::retry::{DelayRange, RetryPolicy};
use crate::storage::{PostRecord, StatusStore};
use crate::Result;
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the download manager
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub max_concurrent: usize,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub media_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub account_delay: DelayRange,
}

impl DownloadSettings {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_secs(config.cooldown_secs),
            media_dir: config.media_dir.clone(),
            thumbnail_dir: config.thumbnail_dir.clone(),
            account_delay: config.account_delay(),
        }
    }
}

/// Outcome counts for one work-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Posts whose media was transferred in this call
    pub downloaded: usize,
    /// Posts marked downloaded because the file was already on disk
    pub already_present: usize,
    /// Posts marked unavailable by the circuit breaker
    pub unavailable: usize,
    /// Posts skipped (already terminal or without a media URL)
    pub skipped: usize,
    /// Thumbnails transferred
    pub thumbnails: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: &BatchReport) {
        self.downloaded += other.downloaded;
        self.already_present += other.already_present;
        self.unavailable += other.unavailable;
        self.skipped += other.skipped;
        self.thumbnails += other.thumbnails;
    }
}

/// Totals for a full download pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub accounts: usize,
    pub totals: BatchReport,
}

struct Transfer<'p> {
    id: &'p str,
    url: &'p str,
    dest: PathBuf,
}

/// Downloads selected media and records the outcome of every post
pub struct DownloadManager<'a, M: MediaSource + ?Sized> {
    source: &'a M,
    settings: DownloadSettings,
    retry: RetryPolicy,
}

impl<'a, M: MediaSource + ?Sized> DownloadManager<'a, M> {
    /// Creates a new download manager
    ///
    /// # Arguments
    ///
    /// * `source` - Where media bytes are fetched from
    /// * `settings` - Batch size, breaker threshold, cooldown and directories
    /// * `retry` - Retry policy applied to each individual transfer
    pub fn new(source: &'a M, settings: DownloadSettings, retry: RetryPolicy) -> Self {
        Self {
            source,
            settings,
            retry,
        }
    }

    pub fn media_path(&self, post_id: &str) -> PathBuf {
        self.settings.media_dir.join(format!("{}.mp4", post_id))
    }

    pub fn thumbnail_path(&self, post_id: &str) -> PathBuf {
        self.settings.thumbnail_dir.join(format!("{}.jpg", post_id))
    }

    /// Downloads the pending selected posts of every account with a selection
    ///
    /// Accounts are visited in insertion order. After an account in which at
    /// least one file was transferred, a randomized politeness delay is slept.
    pub async fn run(&self, store: &mut dyn StatusStore) -> Result<DownloadSummary> {
        let accounts = store.get_accounts_with_selection()?;
        tracing::info!("{} accounts have selected posts", accounts.len());

        let mut summary = DownloadSummary::default();
        for account in accounts {
            let posts = store.get_pending_selected_posts(&account.handle)?;
            if posts.is_empty() {
                tracing::debug!(
                    "All selected posts for {} are already processed",
                    account.handle
                );
                continue;
            }

            tracing::info!(
                "Downloading {} selected posts for {}",
                posts.len(),
                account.handle
            );
            let report = self.download_posts(store, &posts).await?;
            tracing::info!(
                "{}: {} downloaded, {} already present, {} unavailable",
                account.handle,
                report.downloaded,
                report.already_present,
                report.unavailable
            );

            summary.accounts += 1;
            summary.totals.absorb(&report);

            if report.downloaded > 0 {
                let delay = self.settings.account_delay.sleep().await;
                tracing::debug!("Slept {:?} after {}", delay, account.handle);
            }
        }

        Ok(summary)
    }

    /// Downloads one account's work-list
    ///
    /// Posts already in a terminal state are skipped. A media file already on
    /// disk marks the post downloaded without a network request and does not
    /// touch the circuit breaker.
    pub async fn download_posts(
        &self,
        store: &mut dyn StatusStore,
        posts: &[PostRecord],
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let mut breaker = CircuitBreaker::new(self.settings.failure_threshold);

        for batch in posts.chunks(self.settings.max_concurrent.max(1)) {
            let mut videos = Vec::with_capacity(batch.len());
            let mut thumbnails = Vec::new();

            for post in batch {
                if post.status().is_terminal() {
                    report.skipped += 1;
                    continue;
                }

                let dest = self.media_path(&post.id);
                if dest.exists() {
                    store.mark_downloaded(&post.id)?;
                    report.already_present += 1;
                } else if let Some(url) = non_empty(post.video_url.as_deref()) {
                    videos.push(Transfer {
                        id: &post.id,
                        url,
                        dest,
                    });
                } else {
                    tracing::error!("No media URL for post {}, skipping", post.id);
                    report.skipped += 1;
                }

                let thumb_dest = self.thumbnail_path(&post.id);
                if !thumb_dest.exists() {
                    match non_empty(post.thumbnail_url.as_deref()) {
                        Some(url) => thumbnails.push(Transfer {
                            id: &post.id,
                            url,
                            dest: thumb_dest,
                        }),
                        None => tracing::warn!("No thumbnail URL for post {}", post.id),
                    }
                }
            }

            if videos.is_empty() && thumbnails.is_empty() {
                continue;
            }

            let (video_results, thumbnail_results) = futures::join!(
                join_all(videos.iter().map(|t| self.transfer("video", t))),
                join_all(thumbnails.iter().map(|t| self.transfer("thumbnail", t)))
            );

            for (transfer, result) in videos.iter().zip(video_results) {
                match result {
                    Ok(bytes) => {
                        let flushed = breaker.record_success();
                        report.unavailable += self.flush_unavailable(store, &flushed)?;
                        store.mark_downloaded(transfer.id)?;
                        report.downloaded += 1;
                        tracing::info!("Downloaded post {} ({} bytes)", transfer.id, bytes);
                    }
                    Err(e) => {
                        tracing::error!("Failed to download post {}: {}", transfer.id, e);
                        if breaker.record_failure(transfer.id) {
                            tracing::error!(
                                "{} consecutive download failures, cooling down for {:?}",
                                self.settings.failure_threshold,
                                self.settings.cooldown
                            );
                            if !self.settings.cooldown.is_zero() {
                                tokio::time::sleep(self.settings.cooldown).await;
                            }
                        }
                    }
                }
            }

            for (transfer, result) in thumbnails.iter().zip(thumbnail_results) {
                match result {
                    Ok(_) => report.thumbnails += 1,
                    Err(e) => tracing::warn!("Failed to download thumbnail {}: {}", transfer.id, e),
                }
            }
        }

        let open_streak = breaker.finish();
        report.unavailable += self.flush_unavailable(store, &open_streak)?;

        Ok(report)
    }

    async fn transfer(
        &self,
        kind: &str,
        transfer: &Transfer<'_>,
    ) -> std::result::Result<u64, DownloadError> {
        let label = format!("{} {}", kind, transfer.id);
        self.retry
            .run(&label, classify, || {
                self.source.fetch_to(transfer.url, &transfer.dest)
            })
            .await
    }

    fn flush_unavailable(&self, store: &mut dyn StatusStore, ids: &[String]) -> Result<usize> {
        let mut marked = 0;
        for id in ids {
            if store.mark_unavailable(id)? {
                tracing::warn!("Marked post {} unavailable", id);
                marked += 1;
            }
        }
        Ok(marked)
    }
}

fn non_empty(url: Option<&str>) -> Option<&str> {
    url.filter(|u| !u.trim().is_empty())
}
