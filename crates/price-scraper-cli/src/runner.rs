//! Wire a transport to a marketplace connector and run once.

use crate::config::{Mode, RunConfig};
use crate::summary::{RunError, RunSummary};
use price_scraper::{
    BrowserTransport, Connector, HttpTransport, MarketplaceConnector, ScrapedProduct,
    ScraperError, Transport, TransportKind,
};
use std::sync::Arc;
use std::time::Instant;

/// Build the transport named by `kind`.
pub fn build_transport(kind: TransportKind) -> anyhow::Result<Arc<dyn Transport>> {
    Ok(match kind {
        TransportKind::Http => Arc::new(HttpTransport::new()),
        TransportKind::Browser => Arc::new(BrowserTransport::chromium()?),
    })
}

/// Run the configured search or detail lookup and summarize the outcome.
/// Scraping failures are recorded in the summary, not returned.
pub async fn run(config: &RunConfig, transport: Arc<dyn Transport>) -> RunSummary {
    let started = Instant::now();
    let kind = transport.kind();
    let mut connector = MarketplaceConnector::new(config.marketplace, transport);
    if let Some(timeout) = config.timeout {
        connector = connector.with_timeout(timeout);
    }

    tracing::info!(
        marketplace = connector.name(),
        transport = %kind,
        mode = config.mode.as_str(),
        "starting run"
    );

    let result: Result<Vec<ScrapedProduct>, ScraperError> = match &config.mode {
        Mode::Search { query } => connector.search_product(query).await,
        Mode::Details { url } => connector
            .get_product_details(url)
            .await
            .map(|found| found.into_iter().collect()),
    };

    let mut summary = RunSummary {
        ok: false,
        duration_ms: started.elapsed().as_millis() as u64,
        transport: kind.to_string(),
        mode: config.mode.as_str().to_string(),
        query: config.mode.query().map(str::to_string),
        url: config.mode.url().map(str::to_string),
        marketplace: config.marketplace.to_string(),
        result_count: 0,
        top_results: Vec::new(),
        error: None,
        finished_at: chrono::Utc::now(),
    };

    match result {
        Ok(products) => {
            summary.ok = true;
            summary.result_count = products.len();
            summary.top_results = products.into_iter().take(config.top).collect();
            tracing::info!(count = summary.result_count, "run finished");
        }
        Err(e) => {
            tracing::error!(kind = %e.kind, "run failed: {}", e.message);
            summary.error = Some(RunError {
                kind: e.kind.to_string(),
                message: e.message,
            });
        }
    }
    summary
}

/// Summary for a run that could not start (for example, no Chromium).
pub fn startup_failure(config: &RunConfig, error: &anyhow::Error) -> RunSummary {
    RunSummary {
        ok: false,
        duration_ms: 0,
        transport: config.transport.to_string(),
        mode: config.mode.as_str().to_string(),
        query: config.mode.query().map(str::to_string),
        url: config.mode.url().map(str::to_string),
        marketplace: config.marketplace.to_string(),
        result_count: 0,
        top_results: Vec::new(),
        error: Some(RunError {
            kind: price_scraper::ErrorKind::Unknown.to_string(),
            message: format!("{error:#}"),
        }),
        finished_at: chrono::Utc::now(),
    }
}
