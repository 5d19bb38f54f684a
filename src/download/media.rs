//! Media transfer: streaming a URL to a local file
//!
//! Transfers are written to `<dest>.part` through a fixed-size buffer and
//! renamed into place only once the body has been fully written, so an
//! interrupted transfer never leaves a file at the final path.

use super::error::DownloadError;
use crate::config::DownloadConfig;
use crate::retry::{RetryAction, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Where media bytes come from
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Downloads `url` to `dest`, returning the number of bytes written
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// Builds the HTTP client used for media transfers
pub fn build_media_client(config: &DownloadConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// Temporary path a transfer writes to before the final rename
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Plain HTTP GET media source
pub struct HttpMediaSource {
    client: Client,
    chunk_size: usize,
}

impl HttpMediaSource {
    pub fn new(client: Client, chunk_size: usize) -> Self {
        Self { client, chunk_size }
    }

    async fn write_body(
        &self,
        mut response: reqwest::Response,
        url: &str,
        part: &Path,
    ) -> Result<u64, DownloadError> {
        let file = fs::File::create(part).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);

        let mut bytes_written: u64 = 0;
        loop {
            let chunk = response.chunk().await.map_err(|source| DownloadError::Http {
                source,
                url: url.to_string(),
                bytes_written,
            })?;
            let Some(chunk) = chunk else {
                break;
            };
            writer.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        writer.flush().await?;

        Ok(bytes_written)
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::Http {
                source,
                url: url.to_string(),
                bytes_written: 0,
            })?;

        if response.status() != StatusCode::OK {
            return Err(DownloadError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let part = part_path(dest);
        match self.write_body(response, url, &part).await {
            Ok(bytes) => {
                fs::rename(&part, dest).await?;
                tracing::debug!("Wrote {} bytes to {}", bytes, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

/// Retry classifier shared by every media transfer
pub(crate) fn classify(e: &DownloadError) -> RetryAction {
    if e.is_retryable() {
        RetryAction::Retry
    } else {
        RetryAction::Abort
    }
}

/// Downloads account avatars next to the crawl
///
/// Avatar failures are logged and never interrupt the crawl.
pub struct AvatarFetcher<'a> {
    source: &'a dyn MediaSource,
    dir: PathBuf,
    retry: RetryPolicy,
}

impl<'a> AvatarFetcher<'a> {
    pub fn new(source: &'a dyn MediaSource, dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            source,
            dir: dir.into(),
            retry,
        }
    }

    pub fn avatar_path(&self, account_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", account_id))
    }

    /// Ensures the avatar for `account_id` is on disk
    ///
    /// # Returns
    ///
    /// `true` if the avatar file exists afterwards
    pub async fn fetch(&self, account_id: &str, url: Option<&str>) -> bool {
        let dest = self.avatar_path(account_id);
        if dest.exists() {
            tracing::debug!("Avatar for {} already present", account_id);
            return true;
        }

        let Some(url) = url else {
            tracing::debug!("No avatar URL for {}", account_id);
            return false;
        };

        let label = format!("avatar {}", account_id);
        match self
            .retry
            .run(&label, classify, || self.source.fetch_to(url, &dest))
            .await
        {
            Ok(_) => {
                tracing::info!("Downloaded avatar for {}", account_id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to download avatar for {}: {}", account_id, e);
                false
            }
        }
    }
}
