//! Records from browser instrumentation blocks and embedded page state.
//!
//! DOM candidates are taken as ready-made triples. API payloads are parsed
//! as JSON and walked by [`JsonWalker`], which emits a candidate for every
//! object carrying both a name-like and a price-like key. Server-rendered
//! Next.js state (`script#__NEXT_DATA__`) is walked the same way, so plain
//! HTTP fetches of such pages get this strategy too.

use super::price::{parse_price, price_from_value};
use super::ExtractionContext;
use crate::blocks::{decode_api_payloads, decode_dom_candidates, has_blocks};
use crate::types::{ExtractionMethod, ScrapedProduct};
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const NAME_KEYS: &[&str] = &[
    "name",
    "title",
    "product_name",
    "productName",
    "display_name",
    "label",
];

pub const PRICE_KEYS: &[&str] = &[
    "price",
    "final_price",
    "special_price",
    "sale_price",
    "regular_price",
    "min_price",
    "max_price",
    "amount",
    "value",
];

const URL_KEYS: &[&str] = &["url", "link", "href", "product_url", "productUrl", "slug"];
const IMAGE_KEYS: &[&str] = &["image", "image_url", "imageUrl", "image_key", "thumbnail"];
const CURRENCY_KEYS: &[&str] = &["currency", "currency_code", "currencyCode", "priceCurrency"];

/// Maximum payloads walked per content.
pub const MAX_PAYLOADS: usize = 40;

/// A name/price pair found inside a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCandidate {
    pub name: String,
    pub price: f64,
    pub currency: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

/// Bounded depth-first visitor over a JSON value.
#[derive(Debug, Clone)]
pub struct JsonWalker {
    max_depth: usize,
    max_candidates: usize,
}

impl Default for JsonWalker {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_candidates: 50,
        }
    }
}

impl JsonWalker {
    pub fn new(max_depth: usize, max_candidates: usize) -> Self {
        Self {
            max_depth,
            max_candidates,
        }
    }

    pub fn walk(&self, root: &Value) -> Vec<JsonCandidate> {
        let mut out = Vec::new();
        self.visit(root, 0, &mut out);
        out
    }

    fn visit(&self, value: &Value, depth: usize, out: &mut Vec<JsonCandidate>) {
        if depth > self.max_depth || out.len() >= self.max_candidates {
            return;
        }
        match value {
            Value::Object(map) => {
                if let Some(candidate) = candidate_from(map) {
                    out.push(candidate);
                }
                for child in map.values() {
                    if child.is_object() || child.is_array() {
                        self.visit(child, depth + 1, out);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.visit(item, depth + 1, out);
                }
            }
            _ => {}
        }
    }
}

fn candidate_from(map: &Map<String, Value>) -> Option<JsonCandidate> {
    let name = NAME_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))?;
    let price = PRICE_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .find_map(price_from_value)?;

    let string_at = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
            .map(str::to_string)
    };

    let currency = string_at(CURRENCY_KEYS).or_else(|| {
        PRICE_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| v.get("currency").and_then(Value::as_str))
            .map(str::to_string)
    });

    Some(JsonCandidate {
        name: name.to_string(),
        price,
        currency,
        url: string_at(URL_KEYS),
        image: string_at(IMAGE_KEYS),
    })
}

const NEXT_DATA_MARKER: &str = "__NEXT_DATA__";

fn next_data_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("script#__NEXT_DATA__").expect("next data selector is valid"))
}

/// The parsed `__NEXT_DATA__` state, if the page carries one.
fn next_data(content: &str) -> Option<Value> {
    if !content.contains(NEXT_DATA_MARKER) {
        return None;
    }
    let document = Html::parse_document(content);
    let text = document.select(next_data_selector()).next()?.inner_html();
    match serde_json::from_str(text.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("skipping unparsable {NEXT_DATA_MARKER}: {e}");
            None
        }
    }
}

fn push_walked(
    products: &mut Vec<ScrapedProduct>,
    walker: &JsonWalker,
    root: &Value,
    method: ExtractionMethod,
    ctx: &ExtractionContext<'_>,
) {
    for candidate in walker.walk(root) {
        let mut product = ctx
            .product(&candidate.name, candidate.price, method)
            .with_url(candidate.url.as_deref().and_then(|u| ctx.absolutize(u)))
            .with_image_url(candidate.image.as_deref().and_then(|u| ctx.absolutize(u)));
        if let Some(currency) = candidate.currency {
            product.currency = currency.to_uppercase();
        }
        products.push(product);
    }
}

pub fn extract(content: &str, ctx: &ExtractionContext<'_>) -> Vec<ScrapedProduct> {
    let mut products = Vec::new();
    let walker = JsonWalker::default();

    if !has_blocks(content) {
        if let Some(state) = next_data(content) {
            push_walked(&mut products, &walker, &state, ExtractionMethod::EmbeddedState, ctx);
        }
        return products;
    }

    for candidate in decode_dom_candidates(content) {
        let Some(price) = parse_price(&candidate.price) else {
            continue;
        };
        products.push(
            ctx.product(&candidate.name, price, ExtractionMethod::EmbeddedState)
                .with_url(candidate.url.as_deref().and_then(|u| ctx.absolutize(u)))
                .with_image_url(candidate.image.as_deref().and_then(|u| ctx.absolutize(u))),
        );
    }

    for payload in decode_api_payloads(content).into_iter().take(MAX_PAYLOADS) {
        match serde_json::from_str::<Value>(&payload.body) {
            Ok(root) => push_walked(&mut products, &walker, &root, ExtractionMethod::Api, ctx),
            Err(e) => tracing::debug!(url = %payload.url, "skipping unparsable payload: {e}"),
        }
    }

    if let Some(state) = next_data(content) {
        push_walked(&mut products, &walker, &state, ExtractionMethod::EmbeddedState, ctx);
    }

    products
}
