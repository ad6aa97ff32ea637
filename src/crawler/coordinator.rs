//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a fixed-length crawl:
//! - Establishing the session once
//! - Fetching each listing page in order, with the previous page as referer
//! - Extracting records and accumulating them in page order
//! - Pacing between pages
//! - Stopping early when asked to shut down
//!
//! Pages are fetched strictly one after another; the pacing is what keeps
//! the crawl under the origin's rate limits.

use crate::config::Config;
use crate::crawler::extractor::{Record, RecordExtractor};
use crate::crawler::fetcher::fetch_url;
use crate::crawler::pacing::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::crawler::session::{init_session, SessionState};
use crate::crawler::transport::{HttpTransport, Transport};
use crate::CrawlError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Where a crawl run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    /// Not started; no network activity yet
    Init,

    /// Establishing the session
    Warmup,

    /// Fetching the page with this index
    FetchPage(u32),

    /// Extracting records from the page with this index
    ParsePage(u32),

    /// Appending the page's records to the run
    Accumulate(u32),

    /// Waiting after the page with this index
    Pace(u32),

    /// Finished; records have been handed back
    Done,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Warmup => write!(f, "warm-up"),
            Self::FetchPage(page) => write!(f, "fetch page {}", page + 1),
            Self::ParsePage(page) => write!(f, "parse page {}", page + 1),
            Self::Accumulate(page) => write!(f, "accumulate page {}", page + 1),
            Self::Pace(page) => write!(f, "pace after page {}", page + 1),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Records from one page plus whether the page could be fetched at all
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub index: u32,
    pub records: Vec<Record>,
    pub succeeded: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    base_url: Url,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    extractor: RecordExtractor,
    policy: BackoffPolicy,
    shutdown: Arc<AtomicBool>,
    phase: CrawlPhase,
}

impl Coordinator {
    /// Creates a coordinator that talks to the network
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(CrawlError)` - The base URL or the HTTP client could not be set up
    pub fn new(config: Config) -> crate::Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_parts(config, transport, Arc::new(TokioSleeper))
    }

    /// Creates a coordinator with a custom transport and clock
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> crate::Result<Self> {
        let base_url = Url::parse(&config.crawler.base_url)?;
        let extractor = RecordExtractor::new().map_err(CrawlError::Extractor)?;
        let policy = BackoffPolicy::from(&config.request);

        Ok(Self {
            config,
            base_url,
            transport,
            sleeper,
            extractor,
            policy,
            shutdown: Arc::new(AtomicBool::new(false)),
            phase: CrawlPhase::Init,
        })
    }

    /// Flag that stops the crawl before the next page when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// URL of the page with the given 0-based index
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(
                "start",
                &start_offset(page, self.config.crawler.page_size).to_string(),
            )
            .append_pair("filter", "");
        url
    }

    /// Referer for the page with the given index: the previous page, or the
    /// bare listing URL for the first page
    pub fn referer_for(&self, page: u32) -> Url {
        if page == 0 {
            self.base_url.clone()
        } else {
            self.page_url(page - 1)
        }
    }

    /// Crawls the configured number of pages with the configured delay
    pub async fn run(&mut self) -> Vec<Record> {
        let page_count = self.config.crawler.page_count;
        let delay = self.config.crawler.inter_page_delay();
        self.crawl_all(page_count, delay).await
    }

    /// Crawls `page_count` pages in order and returns every record found
    ///
    /// A page whose fetch fails after all retries contributes nothing and
    /// the crawl moves on. Records keep page order and in-page order.
    pub async fn crawl_all(&mut self, page_count: u32, inter_page_delay: Duration) -> Vec<Record> {
        self.enter(CrawlPhase::Init);
        let start_time = std::time::Instant::now();

        self.enter(CrawlPhase::Warmup);
        let session = init_session(
            self.transport.as_ref(),
            self.sleeper.as_ref(),
            &self.config.session,
            &self.base_url,
            self.policy.timeout,
        )
        .await;

        let mut records: Vec<Record> = Vec::new();
        let mut failed_pages = 0;

        for page in 0..page_count {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::warn!(
                    "Shutdown requested, stopping before page {}/{}",
                    page + 1,
                    page_count
                );
                break;
            }

            let result = self.crawl_page(&session, page, page_count).await;

            self.enter(CrawlPhase::Accumulate(page));
            if result.succeeded {
                tracing::info!(
                    "Page {}/{} yielded {} records",
                    page + 1,
                    page_count,
                    result.records.len()
                );
                records.extend(result.records);
            } else {
                failed_pages += 1;
                tracing::warn!("Page {}/{} could not be fetched, skipping", page + 1, page_count);
            }

            if page + 1 < page_count && !self.shutdown.load(Ordering::SeqCst) {
                self.enter(CrawlPhase::Pace(page));
                let jitter = self.config.request.page_jitter.sample();
                let wait = inter_page_delay.saturating_add(jitter);
                tracing::info!("Waiting {:.1}s before the next page", wait.as_secs_f64());
                self.sleeper.sleep(wait).await;
            }
        }

        self.enter(CrawlPhase::Done);
        tracing::info!(
            "Crawl finished: {} records from {} pages ({} failed) in {:?}",
            records.len(),
            page_count,
            failed_pages,
            start_time.elapsed()
        );

        records
    }

    /// Fetches and parses a single page
    async fn crawl_page(&mut self, session: &SessionState, page: u32, page_count: u32) -> PageResult {
        let url = self.page_url(page);
        let referer = self.referer_for(page);

        self.enter(CrawlPhase::FetchPage(page));
        tracing::info!("Fetching page {}/{}: {}", page + 1, page_count, url);

        let outcome = fetch_url(
            self.transport.as_ref(),
            session,
            self.sleeper.as_ref(),
            &url,
            Some(referer.as_str()),
            &self.policy,
        )
        .await;

        if !outcome.succeeded {
            return PageResult {
                index: page,
                records: Vec::new(),
                succeeded: false,
            };
        }

        if page == 0 {
            self.save_debug_html(&outcome.html).await;
        }

        self.enter(CrawlPhase::ParsePage(page));
        let records = self.extractor.extract(&outcome.html);

        PageResult {
            index: page,
            records,
            succeeded: true,
        }
    }

    /// Writes the first page to the debug path, if one is configured
    async fn save_debug_html(&self, html: &str) {
        let Some(path) = self.config.crawler.debug_html_path.as_deref() else {
            return;
        };

        match tokio::fs::write(path, html).await {
            Ok(()) => tracing::info!("Saved first page HTML to {}", path),
            Err(e) => tracing::warn!("Failed to save debug HTML to {}: {}", path, e),
        }
    }

    fn enter(&mut self, phase: CrawlPhase) {
        tracing::trace!("Crawl phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }
}

/// Query offset of a page; widened so large pages cannot wrap
fn start_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page) * u64::from(page_size)
}

/// Runs a complete crawl with the network transport
///
/// # Example
///
/// ```no_run
/// use douban_top250::config::Config;
/// use douban_top250::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let records = run_crawl(Config::default()).await?;
/// println!("{} movies", records.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> crate::Result<Vec<Record>> {
    let mut coordinator = Coordinator::new(config)?;
    Ok(coordinator.run().await)
}
