//! price-scraper harness: one search (or product page) per run, summarized
//! as JSON on disk.

pub mod config;
pub mod runner;
pub mod summary;

pub use config::{Mode, Overrides, RunConfig};
pub use runner::{build_transport, run, startup_failure};
pub use summary::{RunError, RunSummary};
