//! Entity fetcher: paginated retrieval of one resource for one account
//!
//! # Termination
//!
//! | Condition | Posts | Following |
//! |-----------|-------|-----------|
//! | First page retries exhausted | Fatal | Non-fatal, flag set |
//! | First page empty or malformed | Both flags set, stop | Flag set |
//! | Later page retries exhausted | Partial data, flag set | Partial data, flag set |
//! | No cursor | Flag set | Flag set |
//! | Empty page with cursor | Flag set | Flag set |
//!
//! Cursors live only on this call stack; an interrupted pagination restarts
//! from page one and relies on idempotent upserts.

use crate::api::{ApiError, PageOutcome, SocialApi};
use crate::retry::{DelayRange, RetryAction, RetryPolicy};
use crate::state::CompletionFlag;
use crate::storage::{FollowEdge, PostRecord, StatusStore};
use crate::{HarvestError, Result};

/// Result of fetching an account's posts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostsOutcome {
    /// The first page carried no posts; both completion flags were set
    NoPosts,

    /// Posts were persisted and the reels flag was set
    Saved(usize),
}

pub(crate) fn classify_api(e: &ApiError) -> RetryAction {
    if e.is_retryable() {
        RetryAction::Retry
    } else {
        RetryAction::Abort
    }
}

/// Paginated fetcher for posts and follow edges
pub struct EntityFetcher<'a, A: SocialApi + ?Sized> {
    api: &'a A,
    retry: &'a RetryPolicy,
    page_delay: DelayRange,
}

impl<'a, A: SocialApi + ?Sized> EntityFetcher<'a, A> {
    /// Creates a new fetcher
    ///
    /// # Arguments
    ///
    /// * `api` - The social API client
    /// * `retry` - Retry policy applied to every page request
    /// * `page_delay` - Politeness delay slept between following pages
    pub fn new(api: &'a A, retry: &'a RetryPolicy, page_delay: DelayRange) -> Self {
        Self {
            api,
            retry,
            page_delay,
        }
    }

    /// Fetches up to `target` posts of `user_id` and persists them
    ///
    /// # Returns
    ///
    /// * `Ok(PostsOutcome)` - Posts saved, or the account has none
    /// * `Err(HarvestError::Fatal)` - The first page could not be fetched
    pub async fn fetch_posts(
        &self,
        store: &mut dyn StatusStore,
        handle: &str,
        user_id: &str,
        target: usize,
    ) -> Result<PostsOutcome> {
        let label = format!("posts page 1 for {}", handle);
        let first = self
            .retry
            .run(&label, classify_api, || self.api.user_clips(user_id, None))
            .await
            .map_err(|source| HarvestError::Fatal {
                context: format!("fetching the first posts page of {}", handle),
                source,
            })?;

        let (mut clips, mut cursor) = match first {
            PageOutcome::Page {
                items,
                next_page_id,
            } if !items.is_empty() => (items, next_page_id),
            _ => {
                tracing::info!("{} has 0 posts, skipping all further processing", handle);
                for flag in CompletionFlag::both() {
                    store.mark_flag(handle, flag, true)?;
                }
                return Ok(PostsOutcome::NoPosts);
            }
        };

        let mut page_number = 1;
        while clips.len() < target {
            let Some(page_id) = cursor.take() else {
                tracing::debug!("Reached the last posts page for {}", handle);
                break;
            };
            page_number += 1;

            let label = format!("posts page {} for {}", page_number, handle);
            let result = self
                .retry
                .run(&label, classify_api, || {
                    self.api.user_clips(user_id, Some(page_id.as_str()))
                })
                .await;

            match result {
                Ok(PageOutcome::Page {
                    items,
                    next_page_id,
                }) => {
                    if items.is_empty() {
                        tracing::debug!("Empty posts page {} for {}", page_number, handle);
                        break;
                    }
                    clips.extend(items);
                    cursor = next_page_id;
                }
                Ok(PageOutcome::Done) => {
                    tracing::info!("No more posts found for {}", handle);
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to fetch posts page {} for {}, keeping partial data: {}",
                        page_number,
                        handle,
                        e
                    );
                    break;
                }
            }
        }

        clips.truncate(target);
        let records: Vec<PostRecord> = clips.iter().map(|clip| clip.to_record(user_id)).collect();
        let saved = store.upsert_posts(user_id, &records)?;
        store.mark_flag(handle, CompletionFlag::Reels, true)?;

        tracing::info!("Saved {} posts for {}", saved, handle);
        Ok(PostsOutcome::Saved(saved))
    }

    /// Fetches every page of accounts followed by `user_id`
    ///
    /// Edges are persisted page by page. Failures are never fatal: the loop
    /// stops and the following flag is set with whatever was collected.
    ///
    /// # Returns
    ///
    /// The number of newly inserted edges
    pub async fn fetch_following(
        &self,
        store: &mut dyn StatusStore,
        handle: &str,
        user_id: &str,
    ) -> Result<usize> {
        let mut cursor: Option<String> = None;
        let mut inserted = 0;
        let mut page_number = 0;

        loop {
            page_number += 1;
            let label = format!("following page {} for {}", page_number, handle);
            let result = self
                .retry
                .run(&label, classify_api, || {
                    self.api.user_following(user_id, cursor.as_deref())
                })
                .await;

            let (users, next_page_id) = match result {
                Ok(PageOutcome::Page {
                    items,
                    next_page_id,
                }) => (items, next_page_id),
                Ok(PageOutcome::Done) => {
                    tracing::info!("No more following found for {}", handle);
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to fetch following page {} for {}, marking complete: {}",
                        page_number,
                        handle,
                        e
                    );
                    break;
                }
            };

            if users.is_empty() {
                tracing::info!(
                    "Following page {} for {} is empty, treating as complete",
                    page_number,
                    handle
                );
                break;
            }

            let edges: Vec<FollowEdge> = users
                .into_iter()
                .map(|user| FollowEdge {
                    follower_id: user_id.to_string(),
                    followed_id: user.pk,
                    followed_handle: user.username,
                })
                .collect();
            inserted += store.insert_edges_ignore_duplicates(&edges)?;

            match next_page_id {
                Some(next) => {
                    tracing::debug!("Fetched following page {} for {}", page_number, handle);
                    cursor = Some(next);
                    self.page_delay.sleep().await;
                }
                None => {
                    tracing::info!("Reached the last following page for {}", handle);
                    break;
                }
            }
        }

        store.mark_flag(handle, CompletionFlag::Following, true)?;
        Ok(inserted)
    }
}
