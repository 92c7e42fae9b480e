//! Personal-information filter for blind-date chats. Pure: a message string
//! goes in, a verdict comes out, nothing else happens here.

use regex::Regex;
use std::sync::LazyLock;

/// Outcome of filtering one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub allowed: bool,
    pub blocked_reason: Option<String>,
    pub detected_types: Vec<String>,
}

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    // E.164 or 10-digit with common separators
    Regex::new(r"\+[1-9]\d{7,14}|\b\d{3}[-. ]?\d{3}[-. ]?\d{4}\b").expect("phone regex")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email regex")
});

// A bare @handle, not the @ inside an e-mail address.
static HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w@.])@[A-Za-z0-9_.]{2,}").expect("handle regex")
});

// Platform name followed by an identifier ("insta: foo_bar", "my snap is x").
static PLATFORM_HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:insta(?:gram)?|snap(?:chat)?|telegram|whats?app|signal|discord|tiktok|twitter|facebook|fb)\b(?:\s+is)?\s*[:\-]?\s*@?[A-Za-z0-9_.]{3,}",
    )
    .expect("platform handle regex")
});

// Profile URLs that resolve to a handle.
static SOCIAL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:https?://)?(?:www\.)?(?:instagram\.com|facebook\.com|fb\.com|twitter\.com|x\.com|t\.me|tiktok\.com|snapchat\.com|wa\.me)/[A-Za-z0-9_.\-]{2,}",
    )
    .expect("social url regex")
});

/// Scan one message. Detection is regex-only and deterministic; the caller
/// decides what to do with the verdict (blind-date sends are rejected).
pub fn scan(text: &str) -> FilterResult {
    let mut detected = Vec::new();

    if PHONE.is_match(text) {
        detected.push("phone".to_string());
    }
    if EMAIL.is_match(text) {
        detected.push("email".to_string());
    }
    if HANDLE.is_match(text) || PLATFORM_HANDLE.is_match(text) {
        detected.push("handle".to_string());
    }
    if SOCIAL_URL.is_match(text) {
        detected.push("url".to_string());
    }

    if detected.is_empty() {
        FilterResult {
            allowed: true,
            blocked_reason: None,
            detected_types: Vec::new(),
        }
    } else {
        FilterResult {
            allowed: false,
            blocked_reason: Some(format!(
                "Message withheld: sharing {} is not allowed before reveal",
                detected.join(", ")
            )),
            detected_types: detected,
        }
    }
}
