//! Account processor: per-account orchestration of one crawl step

use super::fetcher::{classify_api, EntityFetcher, PostsOutcome};
use crate::api::{ProfileLookup, SocialApi};
use crate::config::PolicyConfig;
use crate::download::AvatarFetcher;
use crate::retry::{DelayRange, RetryPolicy};
use crate::state::CompletionFlag;
use crate::storage::{AccountRecord, StatusStore};
use crate::{HarvestError, Result};

/// Thresholds deciding how much of an account is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlPolicy {
    pub reels_to_fetch: usize,
    pub max_following: i64,
    pub min_followers: i64,
    pub top_posts: usize,
}

impl CrawlPolicy {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            reels_to_fetch: config.reels_to_fetch,
            max_following: config.max_following,
            min_followers: config.min_followers,
            top_posts: config.top_posts,
        }
    }

    /// Accounts following too many others or with too small an audience are
    /// not worth crawling
    pub fn should_skip(&self, follower_count: i64, following_count: i64) -> bool {
        following_count > self.max_following || follower_count < self.min_followers
    }
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

/// What happened to one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    /// The API reports no such account
    NotFound,

    /// Thresholds excluded the account
    Skipped {
        follower_count: i64,
        following_count: i64,
    },

    /// The account has no posts
    NoPosts,

    Processed {
        posts_saved: usize,
        edges_inserted: usize,
        selected: usize,
    },
}

/// Recomputes an account's selected set from its top posts by play count
///
/// # Returns
///
/// The size of the new selected set; an account without posts keeps no set.
pub fn refresh_selection(
    store: &mut dyn StatusStore,
    handle: &str,
    owner_id: &str,
    top_posts: usize,
) -> Result<usize> {
    let top = store.select_top_posts(owner_id, top_posts)?;
    if top.is_empty() {
        return Ok(0);
    }
    store.set_selected_posts(handle, &top)?;
    tracing::info!("Selected top {} posts for {}", top.len(), handle);
    Ok(top.len())
}

/// Processes one account: profile, thresholds, posts, following, selection
pub struct AccountProcessor<'a, A: SocialApi + ?Sized> {
    api: &'a A,
    retry: RetryPolicy,
    policy: CrawlPolicy,
    page_delay: DelayRange,
    avatars: Option<AvatarFetcher<'a>>,
}

impl<'a, A: SocialApi + ?Sized> AccountProcessor<'a, A> {
    pub fn new(api: &'a A, retry: RetryPolicy, policy: CrawlPolicy, page_delay: DelayRange) -> Self {
        Self {
            api,
            retry,
            policy,
            page_delay,
            avatars: None,
        }
    }

    /// Downloads each processed account's avatar with the given fetcher
    pub fn with_avatars(mut self, avatars: AvatarFetcher<'a>) -> Self {
        self.avatars = Some(avatars);
        self
    }

    pub fn policy(&self) -> &CrawlPolicy {
        &self.policy
    }

    /// Processes a single account
    ///
    /// # Steps
    ///
    /// 1. Fetch the profile (fatal after retry exhaustion; "not found" sets both flags)
    /// 2. Persist the profile and download the avatar
    /// 3. Apply the skip policy (sets both flags, no further requests)
    /// 4. Fetch posts if `reels_complete` is false
    /// 5. Fetch following if `following_complete` is false
    /// 6. Recompute the selected set
    pub async fn process(
        &self,
        store: &mut dyn StatusStore,
        account: &AccountRecord,
    ) -> Result<AccountOutcome> {
        let handle = account.handle.as_str();

        let label = format!("profile {}", handle);
        let lookup = self
            .retry
            .run(&label, classify_api, || self.api.user_by_handle(handle))
            .await
            .map_err(|source| HarvestError::Fatal {
                context: format!("fetching the profile of {}", handle),
                source,
            })?;

        let profile = match lookup {
            ProfileLookup::Found(profile) => profile,
            ProfileLookup::NotFound => {
                tracing::warn!("Account {} not found, marking complete", handle);
                for flag in CompletionFlag::both() {
                    store.mark_flag(handle, flag, true)?;
                }
                return Ok(AccountOutcome::NotFound);
            }
        };

        let record = profile.to_record(handle);
        store.upsert_profile(&record)?;
        tracing::debug!(
            "Saved profile for {} ({} followers, {} following)",
            handle,
            record.follower_count,
            record.following_count
        );

        if let Some(avatars) = &self.avatars {
            avatars.fetch(&profile.pk, profile.avatar_url()).await;
        }

        if self
            .policy
            .should_skip(record.follower_count, record.following_count)
        {
            tracing::info!(
                "Skipping {}: {} followers, {} following",
                handle,
                record.follower_count,
                record.following_count
            );
            for flag in CompletionFlag::both() {
                store.mark_flag(handle, flag, true)?;
            }
            return Ok(AccountOutcome::Skipped {
                follower_count: record.follower_count,
                following_count: record.following_count,
            });
        }

        let fetcher = EntityFetcher::new(self.api, &self.retry, self.page_delay);

        let mut posts_saved = 0;
        if account.reels_complete {
            tracing::debug!("Posts already complete for {}", handle);
        } else {
            match fetcher
                .fetch_posts(store, handle, &profile.pk, self.policy.reels_to_fetch)
                .await?
            {
                PostsOutcome::NoPosts => return Ok(AccountOutcome::NoPosts),
                PostsOutcome::Saved(saved) => posts_saved = saved,
            }
        }

        let edges_inserted = if account.following_complete {
            tracing::debug!("Following already complete for {}", handle);
            0
        } else {
            fetcher.fetch_following(store, handle, &profile.pk).await?
        };

        let selected = refresh_selection(store, handle, &profile.pk, self.policy.top_posts)?;

        Ok(AccountOutcome::Processed {
            posts_saved,
            edges_inserted,
            selected,
        })
    }
}
