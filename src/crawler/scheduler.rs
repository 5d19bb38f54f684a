//! Crawl scheduler
//!
//! Walks every pending account in insertion order, one at a time, with a
//! randomized politeness delay between accounts. Any error returned by the
//! account processor stops the run; the store stays resumable because every
//! write already made is a self-contained upsert.

use super::processor::{refresh_selection, AccountOutcome, AccountProcessor};
use crate::api::SocialApi;
use crate::retry::DelayRange;
use crate::storage::StatusStore;
use crate::Result;

/// Totals for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub accounts_processed: usize,
    pub not_found: usize,
    pub skipped: usize,
    pub no_posts: usize,
    pub posts_saved: usize,
    pub edges_inserted: usize,
    pub selections_filled: usize,
}

impl CrawlSummary {
    fn record(&mut self, outcome: &AccountOutcome) {
        self.accounts_processed += 1;
        match outcome {
            AccountOutcome::NotFound => self.not_found += 1,
            AccountOutcome::Skipped { .. } => self.skipped += 1,
            AccountOutcome::NoPosts => self.no_posts += 1,
            AccountOutcome::Processed {
                posts_saved,
                edges_inserted,
                ..
            } => {
                self.posts_saved += posts_saved;
                self.edges_inserted += edges_inserted;
            }
        }
    }
}

pub struct CrawlScheduler<'a, A: SocialApi + ?Sized> {
    processor: AccountProcessor<'a, A>,
    account_delay: DelayRange,
}

impl<'a, A: SocialApi + ?Sized> CrawlScheduler<'a, A> {
    pub fn new(processor: AccountProcessor<'a, A>, account_delay: DelayRange) -> Self {
        Self {
            processor,
            account_delay,
        }
    }

    /// Processes all pending accounts, then fills missing selections
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Every pending account was visited
    /// * `Err(HarvestError)` - The run stopped early (fatal API failure or storage error)
    pub async fn run(&self, store: &mut dyn StatusStore) -> Result<CrawlSummary> {
        let pending = store.get_pending_accounts()?;
        let total = pending.len();
        tracing::info!("{} accounts need crawling", total);

        let mut summary = CrawlSummary::default();
        for (index, account) in pending.iter().enumerate() {
            tracing::info!("[{}/{}] Processing {}", index + 1, total, account.handle);

            let outcome = self.processor.process(store, account).await?;
            tracing::debug!("{}: {:?}", account.handle, outcome);
            summary.record(&outcome);

            if index + 1 < total {
                self.account_delay.sleep().await;
            }
        }

        summary.selections_filled = self.fill_missing_selections(store)?;

        tracing::info!(
            "Crawl finished: {} accounts, {} posts saved, {} new follow edges",
            summary.accounts_processed,
            summary.posts_saved,
            summary.edges_inserted
        );
        Ok(summary)
    }

    /// Gives every account that owns posts but has no selected set one
    pub fn fill_missing_selections(&self, store: &mut dyn StatusStore) -> Result<usize> {
        let top_posts = self.processor.policy().top_posts;
        let mut filled = 0;

        for account in store.get_accounts_missing_selection()? {
            let Some(account_id) = account.account_id.as_deref() else {
                continue;
            };
            if refresh_selection(store, &account.handle, account_id, top_posts)? > 0 {
                filled += 1;
            }
        }

        if filled > 0 {
            tracing::info!("Filled missing selections for {} accounts", filled);
        }
        Ok(filled)
    }
}
