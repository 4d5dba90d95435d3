//! Marketplace-specific markup patterns.
//!
//! Raw markup is split at repeating product-container boundaries; each
//! container is then searched for a name, a price (attribute value first,
//! then visible price text) and a product link.

use super::price::parse_price;
use super::ExtractionContext;
use crate::types::{ExtractionMethod, ScrapedProduct};
use regex::Regex;
use std::sync::OnceLock;

/// Containers examined per page.
pub const MAX_CONTAINERS: usize = 10;
/// Bytes of markup searched after a container boundary.
const MAX_CONTAINER_BYTES: usize = 16 * 1024;

/// Uncompiled pattern set, as declared by a marketplace.
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    /// Matches the opening of each product container.
    pub container: &'static str,
    /// Capture 1: product name markup.
    pub name: &'static str,
    /// Capture 1: machine-readable price attribute.
    pub price_attr: Option<&'static str>,
    /// Capture 1: visible price text.
    pub price_text: &'static str,
    /// Capture 1: product link.
    pub link: &'static str,
}

/// Compiled [`PatternSpec`].
#[derive(Debug, Clone)]
pub struct PatternProfile {
    container: Regex,
    name: Regex,
    price_attr: Option<Regex>,
    price_text: Regex,
    link: Regex,
}

impl PatternProfile {
    pub fn compile(spec: &PatternSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            container: Regex::new(spec.container)?,
            name: Regex::new(spec.name)?,
            price_attr: spec.price_attr.map(Regex::new).transpose()?,
            price_text: Regex::new(spec.price_text)?,
            link: Regex::new(spec.link)?,
        })
    }

    /// Container slices: from each boundary to the next (or a size cap).
    fn containers<'c>(&self, content: &'c str) -> Vec<&'c str> {
        let starts: Vec<usize> = self
            .container
            .find_iter(content)
            .map(|m| m.start())
            .take(MAX_CONTAINERS + 1)
            .collect();
        starts
            .iter()
            .enumerate()
            .take(MAX_CONTAINERS)
            .map(|(i, &start)| {
                let end = starts
                    .get(i + 1)
                    .copied()
                    .unwrap_or(content.len())
                    .min(floor_char_boundary(content, start + MAX_CONTAINER_BYTES));
                &content[start..end]
            })
            .collect()
    }

    fn parse_container(&self, block: &str, ctx: &ExtractionContext<'_>) -> Option<ScrapedProduct> {
        let name = self
            .name
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(&strip_tags(m.as_str())))
            .filter(|n| !n.trim().is_empty())?;

        let price = self
            .price_attr
            .as_ref()
            .and_then(|re| re.captures(block))
            .and_then(|c| c.get(1))
            .and_then(|m| parse_price(m.as_str()))
            .or_else(|| {
                self.price_text
                    .captures(block)
                    .and_then(|c| c.get(1))
                    .and_then(|m| parse_price(&strip_tags(m.as_str())))
            })?;

        let url = self
            .link
            .captures(block)
            .and_then(|c| c.get(1))
            .and_then(|m| ctx.absolutize(&decode_entities(m.as_str())));

        Some(ctx.product(&name, price, ExtractionMethod::PatternMatch).with_url(url))
    }
}

pub fn extract(content: &str, ctx: &ExtractionContext<'_>) -> Vec<ScrapedProduct> {
    let Some(profile) = ctx.patterns else {
        return Vec::new();
    };
    profile
        .containers(content)
        .into_iter()
        .filter_map(|block| profile.parse_container(block, ctx))
        .collect()
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"))
}

fn strip_tags(markup: &str) -> String {
    tag_regex().replace_all(markup, " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
