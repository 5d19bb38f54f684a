use thiserror::Error;

/// Typed media transfer errors enabling retry classification.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("HTTP error downloading {url} (bytes_so_far={bytes_written}): {source}")]
    Http {
        source: reqwest::Error,
        url: String,
        bytes_written: u64,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether this error is transient and worth retrying.
    ///
    /// Every error still counts as a failure for the circuit breaker once the
    /// retries are spent; this only decides whether to spend them.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DownloadError::Http { .. } => true,
            DownloadError::Disk(_) => false,
        }
    }
}
