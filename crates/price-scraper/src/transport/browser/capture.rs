//! Classification of network responses observed while a page renders.
//!
//! The renderer hands over every finished response; [`ResponseCapture`]
//! keeps the ones worth mining for products (JSON with price signals or
//! from API-looking URLs), remembers the first full-size same-host HTML
//! document, and records resource URLs.

use crate::blocks::ApiPayload;

/// Keys whose presence marks a JSON body as product-bearing.
pub const PRICE_SIGNAL_KEYS: &[&str] = &[
    "price",
    "final_price",
    "special_price",
    "product",
    "products",
    "items",
    "hits",
    "sku",
];

/// URL fragments typical of catalog/search APIs.
pub const API_URL_HINTS: &[&str] = &[
    "/api/",
    "graphql",
    "/search",
    "catalog",
    "/v1/",
    "/v2/",
    "/v3/",
    ".json",
    "algolia",
];

/// Maximum payloads retained per fetch.
pub const MAX_PAYLOADS: usize = 40;
/// Bodies above this size are not retained.
pub const MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;
/// An HTML response must be at least this large to count as a real page.
pub const MIN_PAGE_BYTES: usize = 20_000;
/// Maximum resource URLs recorded per fetch.
pub const MAX_RESOURCES: usize = 200;

/// A finished network response as reported by the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkResponse {
    pub url: String,
    pub status: u16,
    pub mime_type: String,
    /// Body text, when the renderer retrieved it.
    pub body: Option<String>,
}

/// Accumulates interesting responses for one fetch.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    page_host: Option<String>,
    payloads: Vec<ApiPayload>,
    raw_html: Option<String>,
    resources: Vec<String>,
}

impl ResponseCapture {
    pub fn new(page_url: &str) -> Self {
        let page_host = url::Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(normalize_host));
        Self {
            page_host,
            ..Default::default()
        }
    }

    pub fn observe(&mut self, response: NetworkResponse) {
        if self.resources.len() < MAX_RESOURCES && !self.resources.contains(&response.url) {
            self.resources.push(response.url.clone());
        }

        let Some(body) = response.body else {
            return;
        };
        if !(200..300).contains(&response.status) || body.len() > MAX_PAYLOAD_BYTES {
            return;
        }

        if looks_like_json(&response.mime_type, &body) {
            if self.payloads.len() < MAX_PAYLOADS
                && (has_price_signal(&body) || is_api_like_url(&response.url))
            {
                self.payloads.push(ApiPayload {
                    url: response.url,
                    body,
                });
            }
            return;
        }

        if self.raw_html.is_none()
            && response.mime_type.contains("html")
            && body.len() >= MIN_PAGE_BYTES
            && self.is_same_host(&response.url)
        {
            self.raw_html = Some(body);
        }
    }

    fn is_same_host(&self, url: &str) -> bool {
        let Some(page_host) = &self.page_host else {
            return false;
        };
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(normalize_host))
            .is_some_and(|h| &h == page_host)
    }

    pub fn payloads(&self) -> &[ApiPayload] {
        &self.payloads
    }

    pub fn raw_html(&self) -> Option<&str> {
        self.raw_html.as_deref()
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn into_parts(self) -> (Vec<ApiPayload>, Option<String>, Vec<String>) {
        (self.payloads, self.raw_html, self.resources)
    }
}

fn normalize_host(host: &str) -> String {
    host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase()
}

/// JSON by declared mime type or by shape.
pub fn looks_like_json(mime_type: &str, body: &str) -> bool {
    if mime_type.contains("json") {
        return true;
    }
    let trimmed = body.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Whether the body mentions one of [`PRICE_SIGNAL_KEYS`] as a JSON key.
pub fn has_price_signal(body: &str) -> bool {
    PRICE_SIGNAL_KEYS
        .iter()
        .any(|key| body.contains(&format!("\"{key}\"")))
}

pub fn is_api_like_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    API_URL_HINTS.iter().any(|hint| lower.contains(hint))
}
