use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
///
/// Every section and field has a default, so an empty file (or no file at
/// all) describes a crawl of the full Top 250 listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub request: RequestConfig,
    pub session: SessionConfig,
    pub output: OutputConfig,
}

/// Listing and pagination configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Base listing URL; page URLs append `?start=N&filter=`
    pub base_url: String,

    /// Number of items per listing page (the `start` step)
    pub page_size: u32,

    /// Total number of pages to fetch
    pub page_count: u32,

    /// Fixed delay between pages (milliseconds), before jitter
    pub inter_page_delay_ms: u64,

    /// Where to save the first page's raw HTML for inspection
    pub debug_html_path: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://movie.douban.com/top250".to_string(),
            page_size: 25,
            page_count: 10,
            inter_page_delay_ms: 1800,
            debug_html_path: None,
        }
    }
}

impl CrawlerConfig {
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }
}

/// Per-request retry and pacing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RequestConfig {
    /// Maximum number of attempts per page
    pub attempt_budget: u32,

    /// Timeout for a single attempt (seconds)
    pub timeout_secs: u64,

    /// Pause before the first attempt
    pub first_attempt_pause: PauseWindow,

    /// Pause before every later attempt
    pub retry_pause: PauseWindow,

    /// Extra random delay added to the inter-page delay
    pub page_jitter: PauseWindow,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            attempt_budget: 3,
            timeout_secs: 15,
            first_attempt_pause: PauseWindow::new(1000, 2000),
            retry_pause: PauseWindow::new(2000, 4000),
            page_jitter: PauseWindow::new(500, 1500),
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session warm-up and identity configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Raw `Cookie` header value copied from a logged-in browser
    pub cookie: Option<String>,

    /// User agent sent with every request
    pub user_agent: String,

    /// Pages visited in order before the crawl starts
    pub warmup_urls: Vec<String>,

    /// Pause after each warm-up request
    pub warmup_pause: PauseWindow,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                .to_string(),
            warmup_urls: vec![
                "https://www.douban.com".to_string(),
                "https://movie.douban.com".to_string(),
            ],
            warmup_pause: PauseWindow::new(1000, 2000),
        }
    }
}

/// Output file configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    pub csv_path: String,
    pub text_path: String,
    pub json_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: "douban_top250.csv".to_string(),
            text_path: "douban_top250.txt".to_string(),
            json_path: "douban_top250.json".to_string(),
        }
    }
}

/// A randomized pause range, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PauseWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl PauseWindow {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A window that never pauses
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
}
