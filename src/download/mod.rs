//! Download module: fetching binary media referenced by the status store
//!
//! # Components
//!
//! - `MediaSource` / `HttpMediaSource`: streaming transfer of one URL to disk
//! - `CircuitBreaker`: consecutive-failure tracking and unavailability marking
//! - `DownloadManager`: batched, concurrency-bounded download of selected posts
//! - `AvatarFetcher`: best-effort avatar download used by the crawler

mod breaker;
mod error;
mod manager;
mod media;

pub use breaker::CircuitBreaker;
pub use error::DownloadError;
pub use manager::{BatchReport, DownloadManager, DownloadSettings, DownloadSummary};
pub use media::{build_media_client, part_path, AvatarFetcher, HttpMediaSource, MediaSource};
