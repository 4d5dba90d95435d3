//! Transport abstraction: retrieve page content for a URL.
//!
//! Two interchangeable implementations share the [`Transport`] contract:
//! [`http::HttpTransport`] sends a single browser-mimicking request, and
//! [`browser::BrowserTransport`] renders the page in headless Chromium and
//! appends captured instrumentation blocks to the returned markup.

pub mod browser;
pub mod http;

use crate::error::ScraperError;
use crate::types::TransportOptions;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// User agent presented by both transports.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/131.0.0.0 Safari/537.36";

/// Request headers a desktop Chrome sends for a top-level navigation.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("user-agent", USER_AGENT),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9,ar;q=0.8"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("sec-ch-ua", r#""Chromium";v="131", "Not_A Brand";v="24""#),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Windows""#),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
];

/// Case-insensitive body fragments that betray an anti-bot page.
pub const BLOCK_INDICATORS: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "access denied",
    "blocked",
    "suspicious activity",
    "unusual traffic",
    "robot check",
    "are you a robot",
    "cf-browser-verification",
    "cf-chl",
    "challenge-platform",
    "perimeterx",
    "px-captcha",
    "datadome",
    "incapsula",
    "distil_r_captcha",
    "akamai bot manager",
];

/// Which transport implementation served a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    Browser,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Browser => "browser",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "fetch" | "request" => Ok(TransportKind::Http),
            "browser" | "chromium" | "headless" => Ok(TransportKind::Browser),
            other => Err(format!("unknown transport '{other}' (expected http or browser)")),
        }
    }
}

/// Retrieve the content of a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`, returning the page content.
    async fn fetch(&self, url: &str, options: &TransportOptions) -> Result<String, ScraperError>;
    /// Which implementation this is.
    fn kind(&self) -> TransportKind;
}

/// Sleep between requests. Pacing is the caller's job; transports never
/// delay on their own.
pub async fn delay(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Merge per-fetch headers over [`DEFAULT_HEADERS`]. Header names are
/// compared case-insensitively and returned lowercased.
pub fn merged_headers(options: &TransportOptions) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = DEFAULT_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (name, value) in &options.headers {
        let name = name.to_ascii_lowercase();
        match headers.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.clone(),
            None => headers.push((name, value.clone())),
        }
    }
    headers
}

/// Return the first block indicator found in `body`, if any.
pub fn detect_block_indicator(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    BLOCK_INDICATORS
        .iter()
        .copied()
        .find(|needle| lower.contains(needle))
}
