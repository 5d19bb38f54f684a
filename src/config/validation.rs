use crate::config::types::{
    ApiConfig, Config, DownloadConfig, OutputConfig, PolicyConfig, RetryConfig, SchedulerConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_retry_config(&config.retry)?;
    validate_policy_config(&config.policy)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_download_config(&config.download)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API connection settings
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.token.is_none() && config.token_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "either api.token or api.token-env must be set".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "api.timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry settings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 50 {
        return Err(ConfigError::Validation(format!(
            "retry.max-attempts must be between 1 and 50, got {}",
            config.max_attempts
        )));
    }

    if config.max_delay_secs < config.delay_secs {
        return Err(ConfigError::Validation(format!(
            "retry.max-delay-secs ({}) must be >= retry.delay-secs ({})",
            config.max_delay_secs, config.delay_secs
        )));
    }

    Ok(())
}

/// Validates crawl policy thresholds
fn validate_policy_config(config: &PolicyConfig) -> Result<(), ConfigError> {
    if config.reels_to_fetch < 1 {
        return Err(ConfigError::Validation(
            "policy.reels-to-fetch must be >= 1".to_string(),
        ));
    }

    if config.max_following < 0 || config.min_followers < 0 {
        return Err(ConfigError::Validation(
            "policy thresholds cannot be negative".to_string(),
        ));
    }

    if config.top_posts < 1 || config.top_posts > config.reels_to_fetch {
        return Err(ConfigError::Validation(format!(
            "policy.top-posts must be between 1 and reels-to-fetch ({}), got {}",
            config.reels_to_fetch, config.top_posts
        )));
    }

    Ok(())
}

/// Validates delay ranges
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    validate_range("scheduler.*-delay-ms", config.min_delay_ms, config.max_delay_ms)?;
    validate_range(
        "scheduler.page-delay-*-ms",
        config.page_delay_min_ms,
        config.page_delay_max_ms,
    )?;
    Ok(())
}

/// Validates media download settings
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 64 {
        return Err(ConfigError::Validation(format!(
            "download.max-concurrent must be between 1 and 64, got {}",
            config.max_concurrent
        )));
    }

    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "download.failure-threshold must be >= 1".to_string(),
        ));
    }

    if config.chunk_size < 4096 {
        return Err(ConfigError::Validation(format!(
            "download.chunk-size must be >= 4096 bytes, got {}",
            config.chunk_size
        )));
    }

    if config.transfer_attempts < 1 || config.avatar_attempts < 1 {
        return Err(ConfigError::Validation(
            "download attempt counts must be >= 1".to_string(),
        ));
    }

    for (name, dir) in [
        ("media-dir", &config.media_dir),
        ("thumbnail-dir", &config.thumbnail_dir),
        ("avatar-dir", &config.avatar_dir),
    ] {
        if dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "download.{} cannot be empty",
                name
            )));
        }
    }

    validate_range(
        "download.account-delay-*-ms",
        config.account_delay_min_ms,
        config.account_delay_max_ms,
    )?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_range(name: &str, min: u64, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{}: minimum ({}) must not exceed maximum ({})",
            name, min, max
        )));
    }
    Ok(())
}
