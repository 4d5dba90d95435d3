//! Run configuration: command-line values first, then `PRICE_SCRAPER_*`
//! environment variables, then defaults.

use anyhow::{bail, Context};
use price_scraper::{Marketplace, TransportKind};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_TRANSPORT: &str = "PRICE_SCRAPER_TRANSPORT";
pub const ENV_MARKETPLACE: &str = "PRICE_SCRAPER_MARKETPLACE";
pub const ENV_URL: &str = "PRICE_SCRAPER_URL";
pub const ENV_OUTPUT: &str = "PRICE_SCRAPER_OUTPUT";
pub const ENV_TIMEOUT_MS: &str = "PRICE_SCRAPER_TIMEOUT_MS";
pub const ENV_TOP: &str = "PRICE_SCRAPER_TOP";

pub const DEFAULT_OUTPUT: &str = "scrape-result.json";
pub const DEFAULT_TOP: usize = 5;

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub query: Vec<String>,
    pub transport: Option<String>,
    pub marketplace: Option<String>,
    pub url: Option<String>,
    pub output: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub top: Option<usize>,
}

/// Search by query, or read a single product page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Search { query: String },
    Details { url: String },
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Search { .. } => "search",
            Mode::Details { .. } => "details",
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            Mode::Search { query } => Some(query),
            Mode::Details { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Mode::Search { .. } => None,
            Mode::Details { url } => Some(url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub transport: TransportKind,
    pub marketplace: Marketplace,
    pub output: PathBuf,
    pub timeout: Option<Duration>,
    pub top: usize,
}

impl RunConfig {
    /// Resolve from the process environment.
    pub fn resolve(overrides: Overrides) -> anyhow::Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let transport = match overrides.transport.or_else(|| lookup(ENV_TRANSPORT)) {
            Some(raw) => raw.parse::<TransportKind>().map_err(anyhow::Error::msg)?,
            None => TransportKind::Http,
        };

        let marketplace = match overrides.marketplace.or_else(|| lookup(ENV_MARKETPLACE)) {
            Some(raw) => raw.parse::<Marketplace>()?,
            None => Marketplace::AmazonSa,
        };

        let query = overrides.query.join(" ").trim().to_string();
        let mode = match overrides.url.or_else(|| lookup(ENV_URL)) {
            Some(url) => Mode::Details { url },
            None if query.is_empty() => {
                bail!("nothing to do: pass a search query or set {ENV_URL}")
            }
            None => Mode::Search { query },
        };

        let output = overrides
            .output
            .or_else(|| lookup(ENV_OUTPUT).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

        let timeout_ms = match overrides.timeout_ms {
            Some(ms) => Some(ms),
            None => lookup(ENV_TIMEOUT_MS)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("{ENV_TIMEOUT_MS} must be milliseconds, got '{raw}'"))
                })
                .transpose()?,
        };

        let top = match overrides.top {
            Some(top) => top,
            None => lookup(ENV_TOP)
                .map(|raw| {
                    raw.trim()
                        .parse::<usize>()
                        .with_context(|| format!("{ENV_TOP} must be a count, got '{raw}'"))
                })
                .transpose()?
                .unwrap_or(DEFAULT_TOP),
        };

        Ok(Self {
            mode,
            transport,
            marketplace,
            output,
            timeout: timeout_ms.map(Duration::from_millis),
            top,
        })
    }
}
