//! State module for tracking acquisition progress
//!
//! # Components
//!
//! - `CompletionFlag`: the two per-account crawl phases (reels, following)
//! - `PostStatus`: the download lifecycle of a single post

mod completion;
mod post_status;

// Re-export main types
pub use completion::CompletionFlag;
pub use post_status::PostStatus;
