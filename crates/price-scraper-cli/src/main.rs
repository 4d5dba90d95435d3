//! price-scraper command-line entry point.

use clap::Parser;
use std::path::PathBuf;

use price_scraper_cli::{build_transport, run, startup_failure, Overrides, RunConfig, RunSummary};

#[derive(Parser)]
#[command(
    name = "price-scraper",
    about = "Scrape one marketplace for product prices and write a JSON summary",
    version
)]
struct Cli {
    /// Search query (words are joined with spaces).
    query: Vec<String>,

    /// Transport: http or browser [env: PRICE_SCRAPER_TRANSPORT].
    #[arg(short, long)]
    transport: Option<String>,

    /// Marketplace: amazon-sa, noon, jarir or extra [env: PRICE_SCRAPER_MARKETPLACE].
    #[arg(short, long)]
    marketplace: Option<String>,

    /// Read this product page instead of searching [env: PRICE_SCRAPER_URL].
    #[arg(long)]
    url: Option<String>,

    /// Summary file [env: PRICE_SCRAPER_OUTPUT].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-fetch timeout in milliseconds [env: PRICE_SCRAPER_TIMEOUT_MS].
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of results kept in the summary [env: PRICE_SCRAPER_TOP].
    #[arg(long)]
    top: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = RunConfig::resolve(Overrides {
        query: cli.query,
        transport: cli.transport,
        marketplace: cli.marketplace,
        url: cli.url,
        output: cli.output,
        timeout_ms: cli.timeout_ms,
        top: cli.top,
    })?;

    let summary = match build_transport(config.transport) {
        Ok(transport) => run(&config, transport).await,
        Err(e) => {
            tracing::error!("failed to start {} transport: {e:#}", config.transport);
            startup_failure(&config, &e)
        }
    };

    summary.write_to(&config.output)?;
    print_summary(&summary, &config);

    if !summary.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, config: &RunConfig) {
    if summary.ok {
        println!(
            "{} results from {} via {} in {}ms",
            summary.result_count,
            config.marketplace.display_name(),
            summary.transport,
            summary.duration_ms
        );
        for product in &summary.top_results {
            println!("  {:>10.2} {}  {}", product.price, product.currency, product.name);
        }
    } else if let Some(error) = &summary.error {
        eprintln!("Scrape failed ({}): {}", error.kind, error.message);
    }
    println!("Summary written to {}", config.output.display());
}
