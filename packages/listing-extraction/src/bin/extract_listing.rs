//! CLI for running the extraction pipeline against a single URL.
//!
//! Prints JSON to stdout; logs go to stderr (`RUST_LOG` controls verbosity).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_extraction::ingestors::HttpHtmlFetcher;
use listing_extraction::{
    detect_board, Listing, LlmProvider, MemoryStore, OpenAiProvider, Orchestrator,
    PipelineConfig,
};

#[derive(Parser)]
#[command(name = "extract-listing")]
#[command(about = "Extract structured job data from a posting URL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized URL, board, company slug and posting id
    Normalize { url: String },

    /// Run the full waterfall against an in-memory store
    Run {
        url: String,
        /// Skip the LLM step even when OPENAI_API_KEY is set
        #[arg(long)]
        no_ai: bool,
    },

    /// Fail attempts stuck in flight (reads DATABASE_URL)
    #[cfg(feature = "postgres")]
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,listing_extraction=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;

    match cli.command {
        Commands::Normalize { url } => {
            let info = detect_board(&url).with_context(|| format!("Cannot classify {url}"))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Run { url, no_ai } => run(url, no_ai, config).await?,
        #[cfg(feature = "postgres")]
        Commands::Sweep => sweep(config).await?,
    }

    Ok(())
}

async fn run(url: String, no_ai: bool, config: PipelineConfig) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let listing = Listing::new(url);
    let listing_id = listing.id;
    store.add_listing(listing);

    let fetcher = HttpHtmlFetcher::new(config.html_fetch_timeout)
        .context("Failed to build HTTP client")?;

    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();
    if !no_ai {
        match OpenAiProvider::from_env() {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => tracing::warn!(error = %e, "OpenAI provider unavailable, AI step disabled"),
        }
    }

    let orchestrator = Orchestrator::new(store.clone(), config, Arc::new(fetcher))
        .with_llm_providers(providers);

    let report = orchestrator
        .run_extraction(listing_id)
        .await
        .context("Extraction run failed")?;

    let output = json!({
        "report": report,
        "listing": store.listing(listing_id),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(feature = "postgres")]
async fn sweep(config: PipelineConfig) -> Result<()> {
    use listing_extraction::{LogNotifier, PostgresStore, StuckReclaimer};

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PostgresStore::new(&database_url)
        .await
        .context("Failed to connect to database")?;

    let reclaimer = StuckReclaimer::new(
        Arc::new(store),
        Arc::new(LogNotifier),
        config.stuck_threshold_chrono(),
    );
    let report = reclaimer.sweep().await.context("Sweep failed")?;

    println!(
        "{}",
        json!({
            "reclaimed": report.reclaimed,
            "raced": report.raced,
            "events_closed": report.events_closed,
            "errors": report.errors,
        })
    );
    Ok(())
}
