//! Marketplace connectors: build the URL, fetch through a transport, run the
//! extraction chain and filter the result.

pub mod marketplace;

pub use marketplace::Marketplace;

use crate::error::ScraperError;
use crate::extract::{self, ExtractionContext};
use crate::transport::Transport;
use crate::types::{ScrapedProduct, TransportOptions};
use crate::validate::validate_price;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// A source of product listings for one marketplace.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Marketplace identifier.
    fn name(&self) -> &str;

    /// Search the marketplace and return deduplicated, valid listings.
    async fn search_product(&self, query: &str) -> Result<Vec<ScrapedProduct>, ScraperError>;

    /// Read a single product page. `Ok(None)` when no price could be found.
    async fn get_product_details(&self, url: &str)
        -> Result<Option<ScrapedProduct>, ScraperError>;
}

/// Connector for any [`Marketplace`] over any [`Transport`].
pub struct MarketplaceConnector {
    marketplace: Marketplace,
    transport: Arc<dyn Transport>,
    timeout: Option<Duration>,
    span: tracing::Span,
}

impl MarketplaceConnector {
    pub fn new(marketplace: Marketplace, transport: Arc<dyn Transport>) -> Self {
        Self {
            marketplace,
            transport,
            timeout: None,
            span: tracing::info_span!("connector", marketplace = marketplace.as_str()),
        }
    }

    /// Override the per-fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    /// Options for a search page: wait for the result grid and hydration.
    pub fn search_options(&self) -> TransportOptions {
        let mut options = TransportOptions::default()
            .with_wait_for_js(true)
            .with_wait_for_selector(self.marketplace.wait_selector())
            .with_hydration_probe(self.marketplace.hydration_probe());
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        options
    }

    /// Options for a product page: markup carries structured data, so only
    /// the generic hydration check applies.
    pub fn detail_options(&self) -> TransportOptions {
        let mut options = TransportOptions::default().with_wait_for_js(true);
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        options
    }

    fn context(&self) -> ExtractionContext<'static> {
        ExtractionContext::new(self.marketplace.as_str())
            .with_currency(self.marketplace.currency())
            .with_base_url(self.marketplace.base_url())
            .with_patterns(self.marketplace.patterns())
    }

    async fn fetch(&self, url: &str, options: &TransportOptions) -> Result<String, ScraperError> {
        self.transport
            .fetch(url, options)
            .await
            .map_err(|e| e.with_marketplace(self.marketplace.as_str()))
    }
}

#[async_trait]
impl Connector for MarketplaceConnector {
    fn name(&self) -> &str {
        self.marketplace.as_str()
    }

    async fn search_product(&self, query: &str) -> Result<Vec<ScrapedProduct>, ScraperError> {
        let span = self.span.clone();
        async move {
            let url = self.marketplace.search_url(query)?;
            tracing::info!(query, url = %url, transport = %self.transport.kind(), "searching");

            let content = self.fetch(&url, &self.search_options()).await?;
            let outcome = extract::run_chain(&content, &self.context());
            let products: Vec<ScrapedProduct> = outcome
                .products
                .into_iter()
                .filter(|p| validate_price(p.price, None))
                .collect();

            match outcome.strategy {
                Some(strategy) => tracing::info!(
                    strategy = strategy.as_str(),
                    count = products.len(),
                    "extracted products"
                ),
                None => tracing::warn!(bytes = content.len(), "no products found"),
            }
            Ok(products)
        }
        .instrument(span)
        .await
    }

    async fn get_product_details(
        &self,
        url: &str,
    ) -> Result<Option<ScrapedProduct>, ScraperError> {
        let span = self.span.clone();
        async move {
            tracing::info!(url, transport = %self.transport.kind(), "fetching product page");
            let content = self.fetch(url, &self.detail_options()).await?;
            let product = extract::extract_details(&content, &self.context())
                .filter(|p| validate_price(p.price, None))
                .map(|mut p| {
                    if p.url.is_none() {
                        p.url = Some(url.to_string());
                    }
                    p
                });
            if product.is_none() {
                tracing::warn!(bytes = content.len(), "no product data on page");
            }
            Ok(product)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::TransportKind;
    use crate::types::ExtractionMethod;
    use std::sync::Mutex;

    struct FakeTransport {
        response: Result<String, ErrorKind>,
        seen: Mutex<Vec<(String, TransportOptions)>>,
    }

    impl FakeTransport {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(body.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(kind: ErrorKind) -> Arc<Self> {
            Arc::new(Self {
                response: Err(kind),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch(
            &self,
            url: &str,
            options: &TransportOptions,
        ) -> Result<String, ScraperError> {
            self.seen
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));
            match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(kind) => Err(ScraperError::new(*kind, "scripted failure")),
            }
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Http
        }
    }

    const AMAZON_TILES: &str = r#"<html><body>
        <div data-asin="B0C1" data-component-type="s-search-result" class="s-result-item">
          <a class="a-link-normal" href="/Apple-iPhone-15/dp/B0C1?ref=sr_1_1">
          <h2 class="a-size-mini"><span>Apple iPhone 15 (128 GB) - Black</span></h2></a>
          <span class="a-price"><span class="a-offscreen">SAR 3,199.00</span></span>
        </div>
        <div data-asin="B0C2" data-component-type="s-search-result" class="s-result-item">
          <a class="a-link-normal" href="/Apple-iPhone-15/dp/B0C2">
          <h2><span>Apple iPhone 15 (128 GB) - Black</span></h2></a>
          <span class="a-price"><span class="a-offscreen">SAR 3,199.00</span></span>
        </div>
        <div data-asin="B0C3" data-component-type="s-search-result" class="s-result-item">
          <h2><span>Refurbished iPhone 15 at an absurd price</span></h2>
          <span class="a-price"><span class="a-offscreen">SAR 4,000,000.00</span></span>
        </div>
        </body></html>"#;

    #[tokio::test]
    async fn test_search_uses_marketplace_url_and_options() {
        let transport = FakeTransport::ok(AMAZON_TILES);
        let connector = MarketplaceConnector::new(Marketplace::AmazonSa, transport.clone())
            .with_timeout(Duration::from_secs(7));

        let products = connector.search_product("iphone 15").await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].0, "https://www.amazon.sa/s?k=iphone+15");
        assert_eq!(seen[0].1.timeout, Duration::from_secs(7));
        assert!(seen[0].1.wait_for_js);
        assert!(seen[0].1.hydration_probe.is_some());
        assert!(seen[0].1.wait_for_selector.is_some());

        assert_eq!(products.len(), 1, "duplicate and out-of-range listings removed");
        let p = &products[0];
        assert_eq!(p.name, "Apple iPhone 15 (128 GB) - Black");
        assert_eq!(p.price, 3199.0);
        assert_eq!(p.currency, "SAR");
        assert_eq!(p.marketplace, "amazon-sa");
        assert_eq!(p.extraction_method, ExtractionMethod::PatternMatch);
        assert_eq!(
            p.url.as_deref(),
            Some("https://www.amazon.sa/Apple-iPhone-15/dp/B0C1?ref=sr_1_1")
        );
    }

    #[tokio::test]
    async fn test_out_of_range_structured_hit_falls_through() {
        let page = AMAZON_TILES.replace(
            "<html><body>",
            r#"<html><head><script type="application/ld+json">
            {"@type":"Product","name":"Placeholder bundle","offers":{"price":"9999999","priceCurrency":"SAR"}}
            </script></head><body>"#,
        );
        let connector = MarketplaceConnector::new(Marketplace::AmazonSa, FakeTransport::ok(&page));

        let products = connector.search_product("iphone 15").await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].extraction_method, ExtractionMethod::PatternMatch);
        assert_eq!(products[0].price, 3199.0);
    }

    #[tokio::test]
    async fn test_transport_errors_carry_marketplace() {
        let connector =
            MarketplaceConnector::new(Marketplace::Noon, FakeTransport::failing(ErrorKind::Blocked));
        let err = connector.search_product("airpods").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Blocked);
        assert_eq!(err.marketplace.as_deref(), Some("noon"));
        assert!(err.is_retryable_elsewhere());
    }

    #[tokio::test]
    async fn test_no_products_is_empty_not_error() {
        let connector =
            MarketplaceConnector::new(Marketplace::Extra, FakeTransport::ok("<html></html>"));
        assert!(connector.search_product("tv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_details() {
        let page = r#"<html><head><script type="application/ld+json">
            {"@type":"Product","name":"Galaxy Watch 6","offers":{"price":"999","priceCurrency":"SAR","availability":"InStock"}}
            </script></head></html>"#;
        let connector = MarketplaceConnector::new(Marketplace::Jarir, FakeTransport::ok(page));
        let url = "https://www.jarir.com/sa-en/galaxy-watch-6.html";
        let product = connector.get_product_details(url).await.unwrap().unwrap();
        assert_eq!(product.name, "Galaxy Watch 6");
        assert_eq!(product.price, 999.0);
        assert_eq!(product.url.as_deref(), Some(url));
        assert_eq!(product.marketplace, "jarir");
    }

    #[tokio::test]
    async fn test_product_details_without_data() {
        let connector =
            MarketplaceConnector::new(Marketplace::Jarir, FakeTransport::ok("<html></html>"));
        let product = connector
            .get_product_details("https://www.jarir.com/sa-en/x.html")
            .await
            .unwrap();
        assert!(product.is_none());
    }

    #[test]
    fn test_name() {
        let connector = MarketplaceConnector::new(Marketplace::Noon, FakeTransport::ok(""));
        assert_eq!(connector.name(), "noon");
    }
}
