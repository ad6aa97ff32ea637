//! douban-top250: a polite crawler for the Douban Movie Top 250 listing
//!
//! This crate fetches a fixed number of listing pages from an anti-automation
//! protected source, classifies each response, and extracts structured movie
//! records, degrading page by page instead of failing the whole run.

pub mod config;
pub mod crawler;
pub mod output;

use thiserror::Error;

/// Main error type for crawler setup and CLI operations
///
/// The crawl loop itself never returns these: transport and content problems
/// are converted into logged, per-page outcomes.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Record extractor setup failed: {0}")]
    Extractor(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while writing extracted records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{extract_records, validate, Coordinator, Record, ValidationOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_to_crawl_error() {
        fn check(config: &Config) -> Result<()> {
            config::validate(config)?;
            Ok(())
        }

        let mut config = Config::default();
        config.crawler.page_count = 0;
        let err = check(&config).unwrap_err();
        assert!(matches!(err, CrawlError::Config(ConfigError::Validation(_))));
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_output_error_converts_to_crawl_error() {
        fn check() -> Result<()> {
            let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
            Err(OutputError::from(io))?
        }

        assert!(matches!(check(), Err(CrawlError::Output(OutputError::Io(_)))));
    }
}
