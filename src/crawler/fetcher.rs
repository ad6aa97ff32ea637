//! Request executor
//!
//! This module fetches a single listing page, including:
//! - Politeness pause before the first attempt
//! - Fixed two-tier backoff before every retry
//! - Per-call referer on top of the shared session headers
//! - Body decoding from the declared or sniffed charset
//! - Response classification for diagnostics
//!
//! Only transport failures are retried. A blocked or malformed body is
//! logged and handed back to the caller as-is.

use crate::crawler::pacing::{BackoffPolicy, Sleeper};
use crate::crawler::session::SessionState;
use crate::crawler::transport::{HttpRequest, Transport};
use crate::crawler::validator::{validate, ValidationOutcome};
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use url::Url;

/// How many leading bytes are searched for a `<meta charset>` declaration
const CHARSET_SNIFF_LIMIT: usize = 1024;

/// How much of a suspicious body is echoed to the debug log
const PREVIEW_CHARS: usize = 500;

/// Result of fetching one page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Decoded body; empty when every attempt failed
    pub html: String,

    /// Whether any attempt produced a 2xx response
    pub succeeded: bool,

    /// Number of attempts made
    pub attempts: u32,

    /// Classification of the returned body, if one was received
    pub validation: Option<ValidationOutcome>,
}

impl FetchOutcome {
    fn failed(attempts: u32) -> Self {
        Self {
            html: String::new(),
            succeeded: false,
            attempts,
            validation: None,
        }
    }
}

/// Fetches a URL with retry, backoff and response classification
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout / connection error | Retry after the retry pause |
/// | Non-2xx status | Retry after the retry pause |
/// | Body read error | Retry after the retry pause |
/// | 2xx, valid listing | Return immediately |
/// | 2xx, blocked or malformed | Log, return the body anyway |
/// | Budget exhausted | Return `("", false)` |
///
/// # Arguments
///
/// * `transport` - The HTTP transport
/// * `session` - Shared session headers and cookies
/// * `sleeper` - Clock used for the pauses
/// * `url` - The page to fetch
/// * `referer` - Referer for this call only
/// * `policy` - Attempt budget, timeout and pause windows
pub async fn fetch_url(
    transport: &dyn Transport,
    session: &SessionState,
    sleeper: &dyn Sleeper,
    url: &Url,
    referer: Option<&str>,
    policy: &BackoffPolicy,
) -> FetchOutcome {
    let budget = policy.attempt_budget;

    for attempt in 1..=budget {
        let pause = policy.pause_before(attempt).sample();
        if attempt > 1 {
            tracing::info!(
                "Retry {}/{} for {}, waiting {:.1}s",
                attempt,
                budget,
                url,
                pause.as_secs_f64()
            );
        }
        sleeper.sleep(pause).await;

        let request = HttpRequest {
            url: url.clone(),
            headers: session.request_headers(url, referer),
            timeout: policy.timeout,
        };

        match transport.get(request).await {
            Ok(response) => {
                let html = decode_body(&response.headers, &response.body);
                let validation = validate(&html);

                if !validation.is_valid() {
                    tracing::warn!("{} returned a suspicious page: {}", url, validation);
                    tracing::debug!("HTML preview: {}...", preview(&html));
                }

                return FetchOutcome {
                    html,
                    succeeded: true,
                    attempts: attempt,
                    validation: Some(validation),
                };
            }
            Err(e) => {
                tracing::warn!("Request error (attempt {}/{}): {}", attempt, budget, e);
            }
        }
    }

    tracing::warn!("Giving up on {} after {} attempts", url, budget);
    FetchOutcome::failed(budget)
}

/// Decodes a response body to text
///
/// Uses the `Content-Type` charset when present and known, otherwise a
/// `<meta charset>` declaration near the top of the document, otherwise
/// UTF-8. A byte-order mark overrides all of these.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> String {
    let encoding = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);

    let (text, _, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!("Body contained bytes invalid for {}", encoding.name());
    }
    text.into_owned()
}

/// Extracts the value following `charset=`
fn charset_label(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let label: String = lower[start..]
        .trim_start_matches(&['"', '\''][..])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();

    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(CHARSET_SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head);
    let label = charset_label(&head)?;
    Encoding::for_label(label.as_bytes())
}

fn preview(html: &str) -> String {
    html.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .take(PREVIEW_CHARS)
        .collect()
}
