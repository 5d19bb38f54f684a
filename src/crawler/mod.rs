//! Crawler module: the acquisition state machine
//!
//! # Components
//!
//! - `EntityFetcher`: paginated retrieval of posts and follow edges
//! - `AccountProcessor`: per-account orchestration and the skip policy
//! - `CrawlScheduler`: the sequential loop over pending accounts
//!
//! All three talk to the API through the `SocialApi` trait and persist
//! through the `StatusStore` trait, so they run unchanged against mocks.

mod fetcher;
mod processor;
mod scheduler;

pub use fetcher::{EntityFetcher, PostsOutcome};
pub use processor::{refresh_selection, AccountOutcome, AccountProcessor, CrawlPolicy};
pub use scheduler::{CrawlScheduler, CrawlSummary};
