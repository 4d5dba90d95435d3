//! The supported marketplaces.
//!
//! Adding a marketplace means adding a variant and filling in each match
//! below; there is no per-marketplace connector type.

use crate::error::ScraperError;
use crate::extract::pattern::{PatternProfile, PatternSpec};
use crate::types::DEFAULT_CURRENCY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Marketplace {
    AmazonSa,
    Noon,
    Jarir,
    Extra,
}

pub const ALL: [Marketplace; 4] = [
    Marketplace::AmazonSa,
    Marketplace::Noon,
    Marketplace::Jarir,
    Marketplace::Extra,
];

impl Marketplace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::AmazonSa => "amazon-sa",
            Marketplace::Noon => "noon",
            Marketplace::Jarir => "jarir",
            Marketplace::Extra => "extra",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Marketplace::AmazonSa => "Amazon.sa",
            Marketplace::Noon => "Noon",
            Marketplace::Jarir => "Jarir Bookstore",
            Marketplace::Extra => "eXtra",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Marketplace::AmazonSa => "https://www.amazon.sa",
            Marketplace::Noon => "https://www.noon.com",
            Marketplace::Jarir => "https://www.jarir.com",
            Marketplace::Extra => "https://www.extra.com",
        }
    }

    pub fn currency(&self) -> &'static str {
        DEFAULT_CURRENCY
    }

    /// Search page path and the query parameter carrying the search text.
    fn search_route(&self) -> (&'static str, &'static str) {
        match self {
            Marketplace::AmazonSa => ("/s", "k"),
            Marketplace::Noon => ("/saudi-en/search/", "q"),
            Marketplace::Jarir => ("/sa-en/catalogsearch/result", "search"),
            Marketplace::Extra => ("/en-sa/search/", "text"),
        }
    }

    pub fn search_url(&self, query: &str) -> Result<String, ScraperError> {
        let (path, param) = self.search_route();
        let url = url::Url::parse_with_params(
            &format!("{}{path}", self.base_url()),
            &[(param, query.trim())],
        )
        .map_err(|e| {
            ScraperError::parse(format!("invalid search URL for {}: {e}", self.as_str()))
                .with_marketplace(self.as_str())
        })?;
        Ok(url.to_string())
    }

    /// CSS selector that signals the result grid has rendered.
    pub fn wait_selector(&self) -> &'static str {
        match self {
            Marketplace::AmazonSa => r#"div[data-component-type="s-search-result"]"#,
            Marketplace::Noon => r#"div[class*="productContainer"]"#,
            Marketplace::Jarir => r#"div[class*="product-tile"]"#,
            Marketplace::Extra => r#"div[class*="product-tile-wrapper"]"#,
        }
    }

    /// In-page signal that product data has hydrated.
    pub fn hydration_probe(&self) -> &'static str {
        match self {
            Marketplace::AmazonSa => {
                r#"document.querySelectorAll('[data-component-type="s-search-result"] .a-price').length > 0"#
            }
            Marketplace::Noon => {
                r#"!!window.__NEXT_DATA__ && document.querySelectorAll('[data-qa="product-name"]').length > 0"#
            }
            Marketplace::Jarir => {
                r#"document.querySelectorAll('[class*="product-tile"] [class*="price"]').length > 0"#
            }
            Marketplace::Extra => {
                r#"document.querySelectorAll('[class*="product-tile-wrapper"] [class*="price"]').length > 0"#
            }
        }
    }

    fn pattern_spec(&self) -> PatternSpec {
        match self {
            Marketplace::AmazonSa => PatternSpec {
                container: r#"<div[^>]+data-component-type="s-search-result""#,
                name: r#"(?s)<h2[^>]*>(.*?)</h2>"#,
                price_attr: None,
                price_text: r#"<span class="a-offscreen">([^<]+)</span>"#,
                link: r#"<a[^>]+href="(/[^"]*/dp/[^"]+)""#,
            },
            Marketplace::Noon => PatternSpec {
                container: r#"<div[^>]+class="[^"]*productContainer"#,
                name: r#"(?s)<div[^>]+data-qa="product-name"[^>]*>(.*?)</div>"#,
                price_attr: None,
                price_text: r#"(?s)<strong[^>]+class="[^"]*amount[^"]*"[^>]*>(.*?)</strong>"#,
                link: r#"<a[^>]+href="(/saudi-en/[^"]+)""#,
            },
            Marketplace::Jarir => PatternSpec {
                container: r#"<div[^>]+class="[^"]*product-tile[\s"]"#,
                name: r#"(?s)<a[^>]+class="[^"]*product-tile__link[^"]*"[^>]*>(.*?)</a>"#,
                price_attr: Some(r#"data-price-amount="([\d.]+)""#),
                price_text: r#"(?s)<span[^>]+class="[^"]*price[^"]*"[^>]*>(.*?)</span>"#,
                link: r#"<a[^>]+href="([^"]+)""#,
            },
            Marketplace::Extra => PatternSpec {
                container: r#"<div[^>]+class="[^"]*product-tile-wrapper"#,
                name: r#"(?s)<h2[^>]*class="[^"]*product-name[^"]*"[^>]*>(.*?)</h2>"#,
                price_attr: Some(r#"data-price="([\d.,]+)""#),
                price_text: r#"(?s)<section[^>]+class="[^"]*price[^"]*"[^>]*>(.*?)</section>"#,
                link: r#"<a[^>]+href="(/en-sa/[^"]+/p/[^"]+)""#,
            },
        }
    }

    pub fn patterns(&self) -> &'static PatternProfile {
        static AMAZON: OnceLock<PatternProfile> = OnceLock::new();
        static NOON: OnceLock<PatternProfile> = OnceLock::new();
        static JARIR: OnceLock<PatternProfile> = OnceLock::new();
        static EXTRA: OnceLock<PatternProfile> = OnceLock::new();
        let cell = match self {
            Marketplace::AmazonSa => &AMAZON,
            Marketplace::Noon => &NOON,
            Marketplace::Jarir => &JARIR,
            Marketplace::Extra => &EXTRA,
        };
        cell.get_or_init(|| {
            PatternProfile::compile(&self.pattern_spec()).expect("marketplace patterns are valid")
        })
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon-sa" | "amazon" | "amazon.sa" => Ok(Marketplace::AmazonSa),
            "noon" => Ok(Marketplace::Noon),
            "jarir" => Ok(Marketplace::Jarir),
            "extra" => Ok(Marketplace::Extra),
            other => Err(ScraperError::parse(format!(
                "unknown marketplace '{other}' (expected one of: amazon-sa, noon, jarir, extra)"
            ))),
        }
    }
}
