//! Marketplace price scraping pipeline.
//!
//! A [`Transport`] fetches page content (plain request or headless browser),
//! a [`Connector`] builds marketplace URLs and runs the extraction chain, and
//! the [`extract`] strategies turn content into [`ScrapedProduct`] records.

pub mod blocks;
pub mod connector;
pub mod error;
pub mod extract;
pub mod transport;
pub mod types;
pub mod validate;

pub use connector::{Connector, Marketplace, MarketplaceConnector};
pub use error::{ErrorKind, ScraperError};
pub use extract::{extract_details, run_chain, ExtractionContext};
pub use transport::browser::{BrowserSettings, BrowserTransport};
pub use transport::http::HttpTransport;
pub use transport::{delay, Transport, TransportKind};
pub use types::*;
pub use validate::validate_price;
