//! Crawler module for listing page fetching and record extraction
//!
//! This module contains the core crawling logic, including:
//! - Response classification (listing page vs. anti-bot interstitial)
//! - Record extraction with a fallback selector
//! - HTTP fetching with retry and two-tier backoff
//! - Session warm-up
//! - Overall crawl coordination and pacing

mod coordinator;
mod extractor;
mod fetcher;
pub mod pacing;
mod session;
pub mod transport;
mod validator;

pub use coordinator::{run_crawl, Coordinator, CrawlPhase, PageResult};
pub use extractor::{extract_records, Record, RecordExtractor, MIN_YEAR};
pub use fetcher::{decode_body, fetch_url, FetchOutcome};
pub use pacing::{BackoffPolicy, RecordingSleeper, Sleeper, TokioSleeper};
pub use session::{init_session, SessionState};
pub use transport::{
    build_http_client, HttpRequest, HttpResponse, HttpTransport, Transport, TransportError,
};
pub use validator::{validate, ValidationOutcome, BLOCK_MARKERS, LISTING_MARKERS};

use crate::config::Config;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client
/// 2. Warm up the session
/// 3. Fetch every listing page in order, with pacing
/// 4. Extract and accumulate records
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Vec<Record>)` - Records from every page that could be fetched
/// * `Err(CrawlError)` - The crawler could not be set up
pub async fn crawl(config: Config) -> crate::Result<Vec<Record>> {
    run_crawl(config).await
}
