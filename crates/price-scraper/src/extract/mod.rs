//! Layered product extraction.
//!
//! Every strategy is a pure function from fetched content to candidate
//! records. [`run_chain`] tries them in a fixed order and keeps the output of
//! the first one that yields at least one valid record; later strategies are
//! not consulted. Malformed candidates are skipped, never fatal.

pub mod instrumentation;
pub mod metadata;
pub mod pattern;
pub mod price;
pub mod structured;

use crate::types::{ExtractionMethod, ScrapedProduct, DEFAULT_CURRENCY};
use pattern::PatternProfile;
use std::collections::HashSet;

/// What a strategy needs to know about where the content came from.
#[derive(Debug, Clone)]
pub struct ExtractionContext<'a> {
    /// Marketplace identifier stamped on every record.
    pub marketplace: String,
    /// Currency used when the content does not state one.
    pub currency: String,
    /// Base for resolving relative product and image URLs.
    pub base_url: Option<url::Url>,
    /// Markup patterns for the pattern-match strategy.
    pub patterns: Option<&'a PatternProfile>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(marketplace: impl Into<String>) -> Self {
        Self {
            marketplace: marketplace.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            base_url: None,
            patterns: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = url::Url::parse(base_url).ok();
        self
    }

    pub fn with_patterns(mut self, patterns: &'a PatternProfile) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Resolve a possibly relative URL against the base.
    pub fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        if let Ok(abs) = url::Url::parse(href) {
            return Some(abs.to_string());
        }
        self.base_url
            .as_ref()
            .and_then(|base| base.join(href).ok())
            .map(|u| u.to_string())
    }

    pub(crate) fn product(&self, name: &str, price: f64, method: ExtractionMethod) -> ScrapedProduct {
        ScrapedProduct::new(
            collapse_whitespace(name),
            price,
            self.currency.clone(),
            method,
            self.marketplace.clone(),
        )
    }
}

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    StructuredData,
    Metadata,
    Instrumentation,
    PatternMatch,
}

/// Search-page order.
pub const CHAIN: [Strategy; 4] = [
    Strategy::StructuredData,
    Strategy::Metadata,
    Strategy::Instrumentation,
    Strategy::PatternMatch,
];

/// Product-page order.
pub const DETAIL_CHAIN: [Strategy; 2] = [Strategy::StructuredData, Strategy::Metadata];

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::StructuredData => "structured-data",
            Strategy::Metadata => "metadata",
            Strategy::Instrumentation => "instrumentation",
            Strategy::PatternMatch => "pattern-match",
        }
    }

    pub fn run(&self, content: &str, ctx: &ExtractionContext<'_>) -> Vec<ScrapedProduct> {
        match self {
            Strategy::StructuredData => structured::extract(content, ctx),
            Strategy::Metadata => metadata::extract(content, ctx),
            Strategy::Instrumentation => instrumentation::extract(content, ctx),
            Strategy::PatternMatch => pattern::extract(content, ctx),
        }
    }
}

/// Outcome of a chain run.
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    /// Deduplicated valid records from the winning strategy.
    pub products: Vec<ScrapedProduct>,
    /// The strategy that produced them, if any did.
    pub strategy: Option<Strategy>,
}

/// Run `strategies` in order; the first with a valid record wins.
pub fn run_strategies(
    content: &str,
    ctx: &ExtractionContext<'_>,
    strategies: &[Strategy],
) -> ChainOutcome {
    for strategy in strategies {
        let raw = strategy.run(content, ctx);
        let found = raw.len();
        let products = finalize(raw);
        tracing::debug!(
            strategy = strategy.as_str(),
            candidates = found,
            valid = products.len(),
            "extraction strategy"
        );
        if !products.is_empty() {
            return ChainOutcome {
                products,
                strategy: Some(*strategy),
            };
        }
    }
    ChainOutcome::default()
}

/// Full search-page chain.
pub fn run_chain(content: &str, ctx: &ExtractionContext<'_>) -> ChainOutcome {
    run_strategies(content, ctx, &CHAIN)
}

/// Single-item variant for product pages: structured data then metadata.
pub fn extract_details(content: &str, ctx: &ExtractionContext<'_>) -> Option<ScrapedProduct> {
    run_strategies(content, ctx, &DETAIL_CHAIN)
        .products
        .into_iter()
        .next()
}

/// Keep the first record per `(lowercase(name), price)`.
pub fn dedupe(products: Vec<ScrapedProduct>) -> Vec<ScrapedProduct> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.dedup_key()))
        .collect()
}

/// Dedupe, then drop records without a positive price or a usable name.
pub fn finalize(products: Vec<ScrapedProduct>) -> Vec<ScrapedProduct> {
    dedupe(products)
        .into_iter()
        .filter(ScrapedProduct::is_valid)
        .collect()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price: f64) -> ScrapedProduct {
        ScrapedProduct::new(name, price, "SAR", ExtractionMethod::Api, "noon")
    }

    #[test]
    fn test_dedupe_keeps_first_seen() {
        let out = dedupe(vec![
            product("Galaxy S24", 3199.0),
            product("GALAXY s24", 3199.0),
            product("Galaxy S24", 3099.0),
            product("Pixel 8", 2499.0),
        ]);
        let names: Vec<_> = out.iter().map(|p| (p.name.as_str(), p.price)).collect();
        assert_eq!(
            names,
            vec![("Galaxy S24", 3199.0), ("Galaxy S24", 3099.0), ("Pixel 8", 2499.0)]
        );
    }

    #[test]
    fn test_finalize_filters_invalid() {
        let out = finalize(vec![
            product("Cable", 0.0),
            product("USB", 15.0),
            product("Charger", -3.0),
            product("Power bank", 99.0),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Power bank");
    }

    #[test]
    fn test_structured_data_short_circuits_chain() {
        let html = r#"<html><head>
            <meta property="og:title" content="Other listing">
            <meta property="og:price:amount" content="12">
            <script type="application/ld+json">
            {"@type":"Product","name":"iPhone 14","offers":{"price":"3999","priceCurrency":"SAR"}}
            </script></head></html>"#;
        let ctx = ExtractionContext::new("amazon-sa");
        let outcome = run_chain(html, &ctx);
        assert_eq!(outcome.strategy, Some(Strategy::StructuredData));
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].name, "iPhone 14");
        assert_eq!(outcome.products[0].price, 3999.0);
        assert_eq!(outcome.products[0].currency, "SAR");
        assert_eq!(outcome.products[0].extraction_method, ExtractionMethod::StructuredData);
    }

    #[test]
    fn test_invalid_structured_data_falls_through() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type":"Product","name":"Widget","offers":{"price":"0"}}</script>
            <meta content="Widget Pro" property="og:title">
            <meta content="199.00" property="og:price:amount">
            </head></html>"#;
        let outcome = run_chain(html, &ExtractionContext::new("jarir"));
        assert_eq!(outcome.strategy, Some(Strategy::Metadata));
        assert_eq!(outcome.products[0].name, "Widget Pro");
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        let outcome = run_chain("", &ExtractionContext::new("extra"));
        assert!(outcome.products.is_empty());
        assert!(outcome.strategy.is_none());
    }

    #[test]
    fn test_extract_details_ignores_later_strategies() {
        let instrumentation = crate::blocks::Instrumentation {
            dom_candidates: vec![crate::blocks::DomCandidate {
                name: "Widget X".into(),
                price: "10".into(),
                url: None,
                image: None,
            }],
            ..Default::default()
        };
        let html = &crate::blocks::append_blocks("<html></html>", &instrumentation);
        assert!(extract_details(html, &ExtractionContext::new("noon")).is_none());
        assert!(!run_chain(html, &ExtractionContext::new("noon")).products.is_empty());
    }

    #[test]
    fn test_absolutize() {
        let ctx = ExtractionContext::new("noon").with_base_url("https://www.noon.com/saudi-en/");
        assert_eq!(
            ctx.absolutize("/saudi-en/p/N123").as_deref(),
            Some("https://www.noon.com/saudi-en/p/N123")
        );
        assert_eq!(
            ctx.absolutize("https://cdn.example.com/a.jpg").as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(ctx.absolutize("  "), None);
        assert_eq!(ExtractionContext::new("noon").absolutize("/p/1"), None);
    }
}
