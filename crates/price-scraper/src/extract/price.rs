//! Price text parsing.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d,.]*\d|\d|\.\d+").expect("price regex is valid"))
}

/// Parse the first number in a displayed price.
///
/// Handles currency prefixes/suffixes (`SAR 4,899.00`, `4,899 ر.س`),
/// thousands separators, a decimal comma when no dot is present
/// (`19,99`), dot-grouped thousands with a decimal comma (`1.299,00`),
/// and Arabic-Indic digits. When both separators appear, the last one is
/// the decimal separator.
pub fn parse_price(text: &str) -> Option<f64> {
    let normalized = normalize_digits(text);
    let token = number_regex().find(&normalized)?.as_str();

    let cleaned = match (token.rfind('.'), token.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => token.replace('.', "").replacen(',', ".", 1),
        (Some(_), Some(_)) => token.replace(',', ""),
        (Some(_), None) if token.matches('.').count() > 1 => token.replace('.', ""),
        (Some(_), None) => token.to_string(),
        (None, Some(_)) => match token.rsplit_once(',') {
            Some((head, tail)) if (1..=2).contains(&tail.len()) && !head.contains(',') => {
                format!("{head}.{tail}")
            }
            _ => token.replace(',', ""),
        },
        (None, None) => token.to_string(),
    };

    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Price from a JSON value: a number, a price string, or an object carrying
/// `amount` / `value`.
pub fn price_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price(s),
        Value::Object(map) => ["amount", "value"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_price(s),
                _ => None,
            }),
        _ => None,
    }
}

fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            // Arabic decimal and thousands separators.
            '\u{066B}' => '.',
            '\u{066C}' => ',',
            _ => c,
        })
        .collect()
}
