//! Core data types: scraped product records and per-fetch transport options.

use crate::validate::validate_price;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default per-fetch timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default settle delay applied after the browser's readiness checks.
pub const DEFAULT_ADDITIONAL_WAIT_MS: u64 = 3_000;
/// Currency assumed when a page does not state one.
pub const DEFAULT_CURRENCY: &str = "SAR";

/// Stock state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    PreOrder,
    #[default]
    Unknown,
}

impl Availability {
    /// Normalize a free-form availability string (schema.org URL, label, or
    /// vendor enum) by case-insensitive substring match.
    pub fn from_schema(raw: &str) -> Self {
        let folded: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();

        if folded.contains("outofstock")
            || folded.contains("soldout")
            || folded.contains("discontinued")
            || folded.contains("unavailable")
        {
            Availability::OutOfStock
        } else if folded.contains("preorder") || folded.contains("presale") {
            Availability::PreOrder
        } else if folded.contains("instock")
            || folded.contains("limitedavailability")
            || folded.contains("onlineonly")
        {
            Availability::InStock
        } else {
            Availability::Unknown
        }
    }
}

/// Which extraction strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    StructuredData,
    Metadata,
    EmbeddedState,
    PatternMatch,
    Api,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::StructuredData => "structured-data",
            ExtractionMethod::Metadata => "metadata",
            ExtractionMethod::EmbeddedState => "embedded-state",
            ExtractionMethod::PatternMatch => "pattern-match",
            ExtractionMethod::Api => "api",
        }
    }
}

/// One observed product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProduct {
    pub name: String,
    pub price: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub availability: Availability,
    pub extraction_method: ExtractionMethod,
    pub marketplace: String,
}

impl ScrapedProduct {
    pub fn new(
        name: impl Into<String>,
        price: f64,
        currency: impl Into<String>,
        extraction_method: ExtractionMethod,
        marketplace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            currency: currency.into(),
            url: None,
            image_url: None,
            availability: Availability::Unknown,
            extraction_method,
            marketplace: marketplace.into(),
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// A record is usable when its price passes [`validate_price`] and its
    /// name is longer than three characters.
    pub fn is_valid(&self) -> bool {
        validate_price(self.price, None) && self.name.trim().chars().count() > 3
    }

    /// Duplicate key: lowercase name plus exact price.
    pub fn dedup_key(&self) -> (String, u64) {
        (self.name.to_lowercase(), self.price.to_bits())
    }
}

/// Per-fetch transport configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    /// Overall bound for the fetch (navigation bound for the browser).
    pub timeout: Duration,
    /// Extra request headers, merged over the transport defaults.
    pub headers: BTreeMap<String, String>,
    /// Whether the page needs script execution to show prices.
    pub wait_for_js: bool,
    /// CSS selector signalling render readiness.
    pub wait_for_selector: Option<String>,
    /// JS boolean expression signalling that product data has hydrated.
    pub hydration_probe: Option<String>,
    /// Settle delay after readiness.
    pub additional_wait: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            headers: BTreeMap::new(),
            wait_for_js: false,
            wait_for_selector: None,
            hydration_probe: None,
            additional_wait: Duration::from_millis(DEFAULT_ADDITIONAL_WAIT_MS),
        }
    }
}

impl TransportOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_wait_for_js(mut self, wait: bool) -> Self {
        self.wait_for_js = wait;
        self
    }

    pub fn with_wait_for_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }

    pub fn with_hydration_probe(mut self, probe: impl Into<String>) -> Self {
        self.hydration_probe = Some(probe.into());
        self
    }

    pub fn with_additional_wait(mut self, wait: Duration) -> Self {
        self.additional_wait = wait;
        self
    }
}
