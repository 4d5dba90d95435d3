//! Request-based transport wrapping reqwest.
//!
//! Not a browser: one GET with browser-like headers. A 200 is not taken at
//! face value: the body is scanned for anti-bot markers before it is
//! returned.

use super::{detect_block_indicator, merged_headers, Transport, TransportKind};
use crate::blocks::strip_trailer;
use crate::error::ScraperError;
use crate::types::TransportOptions;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Request-based transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    span: tracing::Span,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            span: tracing::info_span!("transport", kind = "http"),
        }
    }

    /// Log under the given span instead of the default `transport` span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    async fn fetch_inner(
        &self,
        url: &str,
        options: &TransportOptions,
    ) -> Result<String, ScraperError> {
        let headers = header_map(options)?;
        let start = Instant::now();

        let first = tokio::time::timeout(
            options.timeout,
            self.send(&self.client, url, headers.clone(), options.timeout),
        )
        .await;

        let outcome = match first {
            Ok(Err(e)) if !e.is_timeout() && looks_like_protocol_error(&e) => {
                tracing::debug!("protocol error ({e}), retrying over HTTP/1.1");
                let remaining = options.timeout.saturating_sub(start.elapsed());
                tokio::time::timeout(
                    remaining,
                    self.send(&self.h1_client, url, headers, remaining),
                )
                .await
            }
            other => other,
        };

        let elapsed = start.elapsed();
        let (status, body) = match outcome {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(classify_reqwest(e, url, elapsed)),
            Err(_) => {
                return Err(ScraperError::timeout(format!(
                    "request to {url} timed out after {}ms",
                    elapsed.as_millis()
                )))
            }
        };

        if status == 403 || status == 429 {
            return Err(ScraperError::blocked(format!(
                "HTTP {status} from {url}"
            )));
        }
        if !(200..300).contains(&status) {
            return Err(ScraperError::network(format!("HTTP {status} from {url}")));
        }
        if let Some(indicator) = detect_block_indicator(&body) {
            return Err(ScraperError::blocked(format!(
                "block page detected at {url} (matched \"{indicator}\")"
            )));
        }

        tracing::debug!(
            status,
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "fetched"
        );
        // Instrumentation is only ever attached by the browser transport.
        Ok(strip_trailer(body))
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        url: &str,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<(u16, String), reqwest::Error> {
        let resp = client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, options: &TransportOptions) -> Result<String, ScraperError> {
        let span = self.span.clone();
        async move {
            tracing::info!(url, timeout_ms = options.timeout.as_millis() as u64, "fetch");
            let result = self.fetch_inner(url, options).await;
            if let Err(e) = &result {
                tracing::warn!(kind = %e.kind, "fetch failed: {}", e.message);
            }
            result
        }
        .instrument(span)
        .await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}

fn header_map(options: &TransportOptions) -> Result<HeaderMap, ScraperError> {
    let mut map = HeaderMap::new();
    for (name, value) in merged_headers(options) {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ScraperError::unknown(format!("invalid header name '{name}'")).with_source(e))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| ScraperError::unknown(format!("invalid value for header '{name}'")).with_source(e))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn looks_like_protocol_error(err: &reqwest::Error) -> bool {
    let text = format!("{err:?}").to_lowercase();
    text.contains("http2") || text.contains("protocol") || text.contains("connection closed")
}

fn classify_reqwest(err: reqwest::Error, url: &str, elapsed: Duration) -> ScraperError {
    if err.is_timeout() {
        return ScraperError::timeout(format!(
            "request to {url} timed out after {}ms",
            elapsed.as_millis()
        ))
        .with_source(err);
    }
    let mut classified = ScraperError::from(err);
    classified.message = format!("request to {url} failed: {}", classified.message);
    classified
}
