//! JSON-LD product extraction.
//!
//! Accepts a single Product object, a `@graph` containing products, a bare
//! array of them, `ProductGroup`s (falling back to their variants) and
//! `ItemList`s whose elements are products. Blocks that fail to parse are
//! skipped.

use super::price::price_from_value;
use super::ExtractionContext;
use crate::types::{Availability, ExtractionMethod, ScrapedProduct};
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

const MAX_NESTING: usize = 8;

fn jsonld_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("JSON-LD selector is valid")
    })
}

pub fn extract(content: &str, ctx: &ExtractionContext<'_>) -> Vec<ScrapedProduct> {
    if !content.contains("application/ld+json") {
        return Vec::new();
    }
    let document = Html::parse_document(content);
    let mut products = Vec::new();
    for element in document.select(jsonld_selector()) {
        let text = element.inner_html();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) => collect(&value, ctx, 0, &mut products),
            Err(e) => tracing::debug!("skipping malformed JSON-LD block: {e}"),
        }
    }
    products
}

fn collect(value: &Value, ctx: &ExtractionContext<'_>, depth: usize, out: &mut Vec<ScrapedProduct>) {
    if depth > MAX_NESTING {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, ctx, depth + 1, out);
            }
        }
        Value::Object(_) => {
            if let Some(graph) = value.get("@graph") {
                collect(graph, ctx, depth + 1, out);
                return;
            }
            if has_type(value, "Product") {
                if let Some(product) = parse_product(value, ctx) {
                    out.push(product);
                }
            } else if has_type(value, "ProductGroup") {
                match parse_product(value, ctx) {
                    Some(product) => out.push(product),
                    None => {
                        if let Some(variants) = value.get("hasVariant") {
                            collect(variants, ctx, depth + 1, out);
                        }
                    }
                }
            } else if has_type(value, "ItemList") {
                if let Some(elements) = value.get("itemListElement").and_then(Value::as_array) {
                    for element in elements {
                        let item = element.get("item").unwrap_or(element);
                        collect(item, ctx, depth + 1, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// `@type` may be a string or an array of strings.
fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn parse_product(v: &Value, ctx: &ExtractionContext<'_>) -> Option<ScrapedProduct> {
    let name = v.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }

    let offer = match v.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        Some(o @ Value::Object(_)) => Some(o),
        _ => None,
    }?;

    let price = offer
        .get("price")
        .and_then(price_from_value)
        .or_else(|| offer.get("lowPrice").and_then(price_from_value))?;
    if price.is_nan() || price <= 0.0 {
        return None;
    }

    let mut product = ctx.product(name, price, ExtractionMethod::StructuredData);
    if let Some(currency) = offer.get("priceCurrency").and_then(Value::as_str) {
        if !currency.trim().is_empty() {
            product.currency = currency.trim().to_uppercase();
        }
    }

    let url = v
        .get("url")
        .or_else(|| offer.get("url"))
        .and_then(Value::as_str)
        .and_then(|u| ctx.absolutize(u));
    let image = v.get("image").and_then(image_url).and_then(|u| ctx.absolutize(&u));
    let availability = offer
        .get("availability")
        .and_then(Value::as_str)
        .map(Availability::from_schema)
        .unwrap_or_default();

    Some(
        product
            .with_url(url)
            .with_image_url(image)
            .with_availability(availability),
    )
}

/// `image` may be a URL, a list of URLs, or an ImageObject.
fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(image_url),
        Value::Object(obj) => obj
            .get("url")
            .or_else(|| obj.get("contentUrl"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
