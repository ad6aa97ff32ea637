use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, PauseWindow, RequestConfig, SessionConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Largest accepted `page-size`
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Largest accepted `inter-page-delay-ms` (ten minutes)
pub const MAX_INTER_PAGE_DELAY_MS: u64 = 600_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_request_config(&config.request)?;
    validate_session_config(&config.session)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates listing and pagination configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    validate_http_url("base-url", &config.base_url)?;

    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    if config.page_count < 1 || config.page_count > 100 {
        return Err(ConfigError::Validation(format!(
            "page-count must be between 1 and 100, got {}",
            config.page_count
        )));
    }

    if config.inter_page_delay_ms > MAX_INTER_PAGE_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "inter-page-delay-ms must be <= {}, got {}",
            MAX_INTER_PAGE_DELAY_MS, config.inter_page_delay_ms
        )));
    }

    if let Some(path) = &config.debug_html_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "debug-html-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates retry and pacing configuration
fn validate_request_config(config: &RequestConfig) -> ConfigResult<()> {
    if config.attempt_budget < 1 || config.attempt_budget > 10 {
        return Err(ConfigError::Validation(format!(
            "attempt-budget must be between 1 and 10, got {}",
            config.attempt_budget
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    validate_window("first-attempt-pause", &config.first_attempt_pause)?;
    validate_window("retry-pause", &config.retry_pause)?;
    validate_window("page-jitter", &config.page_jitter)?;

    Ok(())
}

/// Validates session configuration
fn validate_session_config(config: &SessionConfig) -> ConfigResult<()> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    for url in &config.warmup_urls {
        validate_http_url("warmup-urls", url)?;
    }

    validate_window("warmup-pause", &config.warmup_pause)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    for (name, path) in [
        ("csv-path", &config.csv_path),
        ("text-path", &config.text_path),
        ("json-path", &config.json_path),
    ] {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_window(name: &str, window: &PauseWindow) -> ConfigResult<()> {
    if window.min_ms > window.max_ms {
        return Err(ConfigError::Validation(format!(
            "{}: min-ms ({}) must not exceed max-ms ({})",
            name, window.min_ms, window.max_ms
        )));
    }
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> ConfigResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}
