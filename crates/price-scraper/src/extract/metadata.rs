//! Social preview metadata (`og:` / `product:` meta tags).

use super::price::parse_price;
use super::ExtractionContext;
use crate::types::{Availability, ExtractionMethod, ScrapedProduct};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;

fn meta_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("meta[content]").expect("meta selector is valid"))
}

fn canonical_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse(r#"link[rel="canonical"][href]"#).expect("canonical selector is valid")
    })
}

/// Meta tags keyed by `property`, falling back to `name`, first value wins.
fn meta_tags(document: &Html) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for element in document.select(meta_selector()) {
        let el = element.value();
        let Some(key) = el.attr("property").or_else(|| el.attr("name")) else {
            continue;
        };
        let content = el.attr("content").unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        tags.entry(key.trim().to_ascii_lowercase())
            .or_insert_with(|| content.to_string());
    }
    tags
}

fn first<'a>(tags: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| tags.get(*k)).map(String::as_str)
}

pub fn extract(content: &str, ctx: &ExtractionContext<'_>) -> Vec<ScrapedProduct> {
    if !content.contains("<meta") {
        return Vec::new();
    }
    let document = Html::parse_document(content);
    let tags = meta_tags(&document);

    let Some(price) =
        first(&tags, &["og:price:amount", "product:price:amount"]).and_then(parse_price)
    else {
        return Vec::new();
    };
    if price <= 0.0 {
        return Vec::new();
    }
    let Some(name) = first(&tags, &["og:title", "twitter:title"]) else {
        return Vec::new();
    };

    let mut product = ctx.product(name, price, ExtractionMethod::Metadata);
    if let Some(currency) = first(&tags, &["og:price:currency", "product:price:currency"]) {
        product.currency = currency.to_uppercase();
    }

    let url = first(&tags, &["og:url"])
        .map(str::to_string)
        .or_else(|| {
            document
                .select(canonical_selector())
                .next()
                .and_then(|el| el.value().attr("href"))
                .map(str::to_string)
        })
        .and_then(|u| ctx.absolutize(&u));
    let image = first(&tags, &["og:image", "og:image:url", "twitter:image"])
        .and_then(|u| ctx.absolutize(u));
    let availability = first(&tags, &["og:availability", "product:availability"])
        .map(Availability::from_schema)
        .unwrap_or_default();

    vec![product
        .with_url(url)
        .with_image_url(image)
        .with_availability(availability)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExtractionContext<'static> {
        ExtractionContext::new("jarir").with_base_url("https://www.jarir.com")
    }

    #[test]
    fn test_property_first_ordering() {
        let html = r#"<html><head>
            <meta property="og:price:amount" content="199.00">
            <meta property="og:price:currency" content="USD">
            <meta property="og:title" content="Widget">
            </head></html>"#;
        let products = extract(html, &ctx());
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price, 199.0);
        assert_eq!(products[0].currency, "USD");
        assert_eq!(products[0].extraction_method, ExtractionMethod::Metadata);
    }

    #[test]
    fn test_content_first_ordering() {
        let html = r#"<html><head>
            <meta content="199.00" property="og:price:amount">
            <meta content="USD" property="og:price:currency">
            <meta content="Widget" property="og:title">
            </head></html>"#;
        let products = extract(html, &ctx());
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price, 199.0);
        assert_eq!(products[0].currency, "USD");
    }

    #[test]
    fn test_product_namespace_canonical_and_defaults() {
        let html = r#"<html><head>
            <meta property="og:title" content="Lenovo IdeaPad 5">
            <meta property="product:price:amount" content="2,799">
            <meta property="og:image" content="/media/ideapad.jpg">
            <meta property="product:availability" content="in stock">
            <link rel="canonical" href="/sa-en/lenovo-ideapad-5">
            </head></html>"#;
        let products = extract(html, &ctx());
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.price, 2799.0);
        assert_eq!(p.currency, "SAR");
        assert_eq!(p.url.as_deref(), Some("https://www.jarir.com/sa-en/lenovo-ideapad-5"));
        assert_eq!(p.image_url.as_deref(), Some("https://www.jarir.com/media/ideapad.jpg"));
        assert_eq!(p.availability, Availability::InStock);
    }

    #[test]
    fn test_rejects_missing_or_invalid_price() {
        let no_price = r#"<meta property="og:title" content="Widget">"#;
        assert!(extract(no_price, &ctx()).is_empty());

        let zero = r#"<meta property="og:title" content="Widget"><meta property="og:price:amount" content="0">"#;
        assert!(extract(zero, &ctx()).is_empty());

        let junk = r#"<meta property="og:title" content="Widget"><meta property="og:price:amount" content="call us">"#;
        assert!(extract(junk, &ctx()).is_empty());
    }
}
