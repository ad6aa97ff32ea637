//! Response classification
//!
//! Distinguishes a genuine listing page from an anti-bot interstitial or an
//! empty/garbled body. Classification is a pure function of the body text and
//! two static marker lists.

use std::fmt;

/// Phrases that only appear on anti-automation or error pages, in check order
///
/// "abnormal request detected", "please log in", "something went wrong",
/// "access denied", and the English access-denied banner.
pub const BLOCK_MARKERS: &[&str] = &[
    "检测到异常请求",
    "请登录",
    "出错了",
    "访问被拒绝",
    "Access Denied",
];

/// Attribute signatures of the item container, list, title and rating elements
pub const LISTING_MARKERS: &[&str] = &[
    r#"class="item""#,
    r#"class="grid_view""#,
    r#"class="title""#,
    r#"class="rating_num""#,
];

/// Classification of a single HTTP response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The body looks like a listing page
    Valid,

    /// The body contains an anti-automation marker
    Blocked(String),

    /// The body is empty or has no recognizable listing structure
    Malformed(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid listing"),
            Self::Blocked(marker) => write!(f, "anti-bot marker detected: {}", marker),
            Self::Malformed(reason) => write!(f, "malformed page: {}", reason),
        }
    }
}

/// Classifies a response body
///
/// The block-marker check runs before the structural check, so an
/// interstitial that happens to reuse listing class names is still reported
/// as blocked.
///
/// # Example
///
/// ```
/// use douban_top250::crawler::{validate, ValidationOutcome};
///
/// let outcome = validate(r#"<div class="item"><span class="title">A</span></div>"#);
/// assert_eq!(outcome, ValidationOutcome::Valid);
/// ```
pub fn validate(html: &str) -> ValidationOutcome {
    if html.trim().is_empty() {
        return ValidationOutcome::Malformed("empty".to_string());
    }

    if let Some(marker) = BLOCK_MARKERS.iter().find(|m| html.contains(*m)) {
        return ValidationOutcome::Blocked((*marker).to_string());
    }

    if LISTING_MARKERS.iter().any(|m| html.contains(m)) {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::Malformed("no listing markers".to_string())
    }
}
