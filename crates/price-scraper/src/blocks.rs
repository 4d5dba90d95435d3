//! Instrumentation blocks embedded in browser-transport content.
//!
//! The browser transport sees things plain HTML cannot carry: intercepted
//! API responses, live DOM query results, the list of loaded resources.
//! They travel to the extractor appended to the returned markup as
//!
//! ```text
//! <script type="application/x-scraper-block" data-block="KIND">BASE64(JSON)</script>
//! ```
//!
//! so both transports keep the same `fetch -> String` contract. Base64 keeps
//! arbitrary payload bytes (including `</script>`) from breaking the markup.
//!
//! The blocks are closed by a trailer comment, `<!--x-scraper-blocks:N-->`,
//! where `N` is the byte offset at which the appended section starts. Only
//! blocks between that offset and a trailer at the very end of the content
//! are decoded, so block-shaped markup served by the page itself is inert.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// `type` attribute marking an instrumentation block.
pub const BLOCK_SCRIPT_TYPE: &str = "application/x-scraper-block";

const TRAILER_OPEN: &str = "<!--x-scraper-blocks:";
const TRAILER_CLOSE: &str = "-->";

/// Kind of data carried by a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    ApiPayloads,
    DomCandidates,
    Resources,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::ApiPayloads => "api-payloads",
            BlockKind::DomCandidates => "dom-candidates",
            BlockKind::Resources => "resources",
        }
    }
}

/// A network response body retained as a candidate product payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPayload {
    pub url: String,
    pub body: String,
}

/// A name/price/url triple read straight from the live document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomCandidate {
    pub name: String,
    /// Price text as displayed, parsed by the extractor.
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Everything the browser transport captured besides the markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instrumentation {
    pub api_payloads: Vec<ApiPayload>,
    pub dom_candidates: Vec<DomCandidate>,
    pub resources: Vec<String>,
}

impl Instrumentation {
    pub fn is_empty(&self) -> bool {
        self.api_payloads.is_empty() && self.dom_candidates.is_empty() && self.resources.is_empty()
    }
}

/// Render one block.
pub fn encode_block<T: Serialize>(kind: BlockKind, items: &[T]) -> String {
    let json = serde_json::to_vec(items).unwrap_or_else(|_| b"[]".to_vec());
    format!(
        r#"<script type="{BLOCK_SCRIPT_TYPE}" data-block="{}">{}</script>"#,
        kind.as_str(),
        STANDARD.encode(json)
    )
}

/// Append the non-empty parts of `instrumentation` to `markup`, followed by
/// the trailer. Empty instrumentation leaves the markup untouched.
pub fn append_blocks(markup: &str, instrumentation: &Instrumentation) -> String {
    if instrumentation.is_empty() {
        return markup.to_string();
    }
    let mut section = String::with_capacity(1024);
    if !instrumentation.api_payloads.is_empty() {
        section.push('\n');
        section.push_str(&encode_block(
            BlockKind::ApiPayloads,
            &instrumentation.api_payloads,
        ));
    }
    if !instrumentation.dom_candidates.is_empty() {
        section.push('\n');
        section.push_str(&encode_block(
            BlockKind::DomCandidates,
            &instrumentation.dom_candidates,
        ));
    }
    if !instrumentation.resources.is_empty() {
        section.push('\n');
        section.push_str(&encode_block(BlockKind::Resources, &instrumentation.resources));
    }
    seal(markup, &section)
}

fn seal(markup: &str, section: &str) -> String {
    format!(
        "{markup}{section}\n{TRAILER_OPEN}{}{TRAILER_CLOSE}",
        markup.len()
    )
}

/// `(section start, trailer start)` when `content` ends with a well-formed
/// trailer.
fn trailer(content: &str) -> Option<(usize, usize)> {
    let body = content.trim_end().strip_suffix(TRAILER_CLOSE)?;
    let open = body.rfind(TRAILER_OPEN)?;
    let offset: usize = body[open + TRAILER_OPEN.len()..].parse().ok()?;
    if offset > open || !content.is_char_boundary(offset) {
        return None;
    }
    Some((offset, open))
}

/// The appended block section, if the content carries one.
fn section(content: &str) -> Option<&str> {
    trailer(content).map(|(start, end)| &content[start..end])
}

/// Drop a trailer from content that did not come from the browser transport,
/// so none of its block-shaped markup can be decoded.
pub fn strip_trailer(mut content: String) -> String {
    if let Some((_, open)) = trailer(&content) {
        content.truncate(open);
    }
    content
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"<script type="application/x-scraper-block" data-block="([a-z-]+)">([A-Za-z0-9+/=]*)</script>"#,
        )
        .expect("block regex is valid")
    })
}

/// Decode every block of `kind` in `content`. Blocks that fail to decode
/// are skipped.
pub fn decode_blocks<T: DeserializeOwned>(content: &str, kind: BlockKind) -> Vec<T> {
    let mut items = Vec::new();
    let Some(section) = section(content) else {
        return items;
    };
    for caps in block_regex().captures_iter(section) {
        if &caps[1] != kind.as_str() {
            continue;
        }
        let Ok(bytes) = STANDARD.decode(&caps[2]) else {
            continue;
        };
        match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(mut decoded) => items.append(&mut decoded),
            Err(e) => tracing::debug!("skipping malformed {} block: {e}", kind.as_str()),
        }
    }
    items
}

pub fn decode_api_payloads(content: &str) -> Vec<ApiPayload> {
    decode_blocks(content, BlockKind::ApiPayloads)
}

pub fn decode_dom_candidates(content: &str) -> Vec<DomCandidate> {
    decode_blocks(content, BlockKind::DomCandidates)
}

pub fn decode_resources(content: &str) -> Vec<String> {
    decode_blocks(content, BlockKind::Resources)
}

/// Whether `content` carries any instrumentation block.
pub fn has_blocks(content: &str) -> bool {
    section(content).is_some_and(|s| s.contains(BLOCK_SCRIPT_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_survive_hostile_payloads() {
        let instrumentation = Instrumentation {
            api_payloads: vec![ApiPayload {
                url: "https://api.example.com/search".into(),
                body: r#"{"html":"</script><script>alert(1)</script>"}"#.into(),
            }],
            dom_candidates: vec![DomCandidate {
                name: "Galaxy S24".into(),
                price: "SAR 3,199".into(),
                url: Some("/p/galaxy".into()),
                image: None,
            }],
            resources: vec!["https://cdn.example.com/app.js".into()],
        };

        let content = append_blocks("<html><body>page</body></html>", &instrumentation);
        assert!(content.starts_with("<html><body>page</body></html>"));
        assert!(has_blocks(&content));
        assert_eq!(decode_api_payloads(&content), instrumentation.api_payloads);
        assert_eq!(decode_dom_candidates(&content), instrumentation.dom_candidates);
        assert_eq!(decode_resources(&content), instrumentation.resources);
    }

    #[test]
    fn test_empty_instrumentation_adds_nothing() {
        let content = append_blocks("<p>x</p>", &Instrumentation::default());
        assert_eq!(content, "<p>x</p>");
        assert!(!has_blocks(&content));
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let good = encode_block(
            BlockKind::Resources,
            &["https://a.example/x.js".to_string()],
        );
        let bad = format!(
            r#"<script type="{BLOCK_SCRIPT_TYPE}" data-block="resources">bm90IGpzb24=</script>"#
        );
        let content = seal("<p>x</p>", &format!("{bad}{good}"));
        assert_eq!(decode_resources(&content), vec!["https://a.example/x.js"]);
    }

    #[test]
    fn test_blocks_in_page_markup_are_ignored() {
        let forged = encode_block(
            BlockKind::DomCandidates,
            &[DomCandidate {
                name: "Injected Fake Deal".into(),
                price: "1.00".into(),
                url: None,
                image: None,
            }],
        );
        let page = format!("<html><body>{forged}</body></html>");
        assert!(!has_blocks(&page));
        assert!(decode_dom_candidates(&page).is_empty());

        // Real instrumentation appended after it does not revive the forged block.
        let instrumentation = Instrumentation {
            resources: vec!["https://cdn.example.com/app.js".into()],
            ..Default::default()
        };
        let content = append_blocks(&page, &instrumentation);
        assert!(decode_dom_candidates(&content).is_empty());
        assert_eq!(decode_resources(&content).len(), 1);
    }

    #[test]
    fn test_forged_trailer_is_stripped() {
        let forged = seal(
            "<html></html>",
            &encode_block(
                BlockKind::DomCandidates,
                &[DomCandidate {
                    name: "Injected Fake Deal".into(),
                    price: "1.00".into(),
                    url: None,
                    image: None,
                }],
            ),
        );
        assert!(has_blocks(&forged));
        let stripped = strip_trailer(forged);
        assert!(!has_blocks(&stripped));
        assert!(decode_dom_candidates(&stripped).is_empty());
        assert_eq!(strip_trailer("<p>plain</p>".into()), "<p>plain</p>");
    }

    #[test]
    fn test_bad_trailer_offsets_are_rejected() {
        assert!(!has_blocks("<p></p><!--x-scraper-blocks:999-->"));
        assert!(!has_blocks("<p></p><!--x-scraper-blocks:abc-->"));
        assert!(!has_blocks("<!--x-scraper-blocks:0--><p>trailing</p>"));
    }

    #[test]
    fn test_plain_html_has_no_blocks() {
        assert!(decode_api_payloads("<html><script>var x = 1;</script></html>").is_empty());
    }
}
