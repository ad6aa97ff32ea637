//! Session establishment
//!
//! Builds the browser-like identity sent with every request, seeds the cookie
//! jar with the optional credential, and visits a few top-level pages so the
//! origin can hand out its tracking and rate-limit cookies before the crawl.
//! Warm-up is best-effort: any failure is logged and the crawl goes ahead.

use crate::config::SessionConfig;
use crate::crawler::pacing::Sleeper;
use crate::crawler::transport::{HttpRequest, Transport};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, COOKIE, REFERER,
    SET_COOKIE, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const BASELINE_HEADERS: &[(&str, &str)] = &[
    ("sec-ch-ua", r#""Chromium";v="122", "Google Chrome";v="122", "Not A(Brand";v="24""#),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Windows""#),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
    ("priority", "u=0, i"),
];

/// Cookies and identity headers shared by every request of a run
///
/// Only the session manager stores cookies into the jar; once the crawl
/// loop starts the state is read-only. Cookie names from the credential
/// take precedence over anything the origin sets during warm-up.
#[derive(Debug, Clone)]
pub struct SessionState {
    headers: HeaderMap,
    cookies: Arc<Jar>,
    credential_names: HashSet<String>,
    has_credential: bool,
    warmed_up: bool,
}

impl SessionState {
    /// Builds the baseline state and seeds the credential for `seed_urls`
    pub fn new(config: &SessionConfig, seed_urls: &[Url]) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
                 image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        for &(name, value) in BASELINE_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        let user_agent = HeaderValue::from_str(config.user_agent.trim()).unwrap_or_else(|_| {
            tracing::warn!("Configured user agent is not a valid header value, using default");
            HeaderValue::from_str(&SessionConfig::default().user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("Mozilla/5.0"))
        });
        headers.insert(USER_AGENT, user_agent);

        let cookies = Arc::new(Jar::default());
        let mut has_credential = false;
        let mut credential_names = HashSet::new();
        if let Some(credential) = config.cookie.as_deref() {
            let pairs: Vec<&str> = credential
                .split(';')
                .map(str::trim)
                .filter(|pair| pair.contains('=') && !pair.starts_with('='))
                .collect();
            for url in seed_urls {
                for pair in &pairs {
                    cookies.add_cookie_str(&format!("{}; Path=/", pair), url);
                }
            }
            credential_names = pairs.iter().filter_map(|pair| cookie_name(pair)).collect();
            has_credential = !pairs.is_empty();
        }

        if !has_credential {
            tracing::warn!("No credential cookie configured; anti-bot detection is more likely");
        }

        Self {
            headers,
            cookies,
            credential_names,
            has_credential,
            warmed_up: false,
        }
    }

    /// Headers for one request: baseline identity, cookies for `url`, and
    /// an optional per-call referer
    pub fn request_headers(&self, url: &Url, referer: Option<&str>) -> HeaderMap {
        let mut headers = self.headers.clone();

        if let Some(cookie) = self.cookies.cookies(url) {
            headers.insert(COOKIE, cookie);
        }

        if let Some(referer) = referer {
            match HeaderValue::from_str(referer) {
                Ok(value) => {
                    headers.insert(REFERER, value);
                }
                Err(_) => tracing::debug!("Skipping invalid referer: {}", referer),
            }
        }

        headers
    }

    /// The `Cookie` header value that would be sent to `url`
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookies
            .cookies(url)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    pub fn has_credential(&self) -> bool {
        self.has_credential
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    fn store_cookies(&self, url: &Url, headers: &HeaderMap) {
        let mut set_cookies = headers.get_all(SET_COOKIE).iter().filter(|value| {
            let shadowed = value
                .to_str()
                .ok()
                .and_then(cookie_name)
                .is_some_and(|name| self.credential_names.contains(&name));
            if shadowed {
                tracing::debug!("Keeping credential cookie over warm-up value from {}", url);
            }
            !shadowed
        });
        self.cookies.set_cookies(&mut set_cookies, url);
    }
}

/// Name part of a `name=value` pair or `Set-Cookie` value
fn cookie_name(cookie: &str) -> Option<String> {
    let (name, _) = cookie.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Establishes the session for a crawl of `base_url`
///
/// Never fails: an unparseable warm-up URL or a failed request stops the
/// warm-up early and the returned state is marked as not warmed up.
pub async fn init_session(
    transport: &dyn Transport,
    sleeper: &dyn Sleeper,
    config: &SessionConfig,
    base_url: &Url,
    timeout: Duration,
) -> SessionState {
    let warmup_urls: Vec<Url> = config
        .warmup_urls
        .iter()
        .filter_map(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Ignoring invalid warm-up URL {}: {}", raw, e);
                None
            }
        })
        .collect();

    let mut seed_urls = warmup_urls.clone();
    seed_urls.push(base_url.clone());
    let mut session = SessionState::new(config, &seed_urls);

    if warmup_urls.is_empty() {
        tracing::info!("No warm-up URLs configured, skipping session warm-up");
        return session;
    }

    for url in &warmup_urls {
        let request = HttpRequest {
            url: url.clone(),
            headers: session.request_headers(url, None),
            timeout,
        };

        match transport.get(request).await {
            Ok(response) => {
                session.store_cookies(&response.url, &response.headers);
                tracing::debug!("Warm-up visit to {} succeeded", url);
                sleeper.sleep(config.warmup_pause.sample()).await;
            }
            Err(e) => {
                tracing::warn!(
                    "Session warm-up failed at {}: {}; crawling without it",
                    url,
                    e
                );
                return session;
            }
        }
    }

    session.warmed_up = true;
    tracing::info!("Session warm-up complete ({} pages visited)", warmup_urls.len());
    session
}
