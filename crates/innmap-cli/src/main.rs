//! innmap CLI
//!
//! Pipeline commands, in the order you run them:
//! - `scrape-toc` — fetch and store the table of contents
//! - `scrape-chapters` — download chapter plaintext (cached, polite)
//! - `extract` — pull location data out of chapter text via the Claude API
//! - `aggregate` — merge per-chapter extractions into the unified dataset
//!   (and assign coordinates)
//! - `status` — show pipeline progress
//! - `serve` — serve the read-only map API (and optional static front end)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod aggregate;
mod extract;
mod scrape;
mod serve;
mod status;

#[derive(Parser)]
#[command(name = "innmap")]
#[command(
    author,
    version,
    about = "Extract location data from The Wandering Inn and build an interactive map dataset"
)]
struct Cli {
    /// Directory for storing scraped/extracted data
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and parse the table of contents from wanderinginn.com
    ScrapeToc {
        #[command(flatten)]
        fetch: scrape::FetchArgs,
    },

    /// Download chapter plaintext (cached, rate-limited)
    ScrapeChapters {
        /// Only scrape chapters from this volume (e.g. vol-1)
        #[arg(long)]
        volume: Option<String>,
        #[command(flatten)]
        fetch: scrape::FetchArgs,
    },

    /// Extract location data from chapter text using the Claude API
    Extract {
        /// Only extract from this volume (e.g. vol-1)
        #[arg(long)]
        volume: Option<String>,
        /// Anthropic model to use
        #[arg(long, env = "ANTHROPIC_MODEL", default_value = "claude-sonnet-4-20250514")]
        model: String,
    },

    /// Merge per-chapter extractions into the unified location dataset
    Aggregate {
        /// Assign estimated coordinates to locations
        #[arg(long, default_value_t = true)]
        coords: bool,
        /// Vocabulary tables (canonical names, exclusions, anchors) JSON file
        #[arg(long)]
        vocab: Option<PathBuf>,
        /// Seed coordinate table JSON file
        #[arg(long)]
        seeds: Option<PathBuf>,
        /// Minimum distinct-chapter mentions for a location to be included
        #[arg(long, default_value_t = 3)]
        min_mentions: u32,
        /// Containment hops to walk when checking traceability
        #[arg(long, default_value_t = 10)]
        max_containment_depth: usize,
    },

    /// Show pipeline progress
    Status,

    /// Serve the read-only map API and optional static front end
    Serve {
        /// Host to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Directory of static files to serve at /
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ScrapeToc { fetch } => scrape::cmd_scrape_toc(&cli.data_dir, &fetch),
        Commands::ScrapeChapters { volume, fetch } => {
            scrape::cmd_scrape_chapters(&cli.data_dir, volume.as_deref(), &fetch)
        }
        Commands::Extract { volume, model } => {
            extract::cmd_extract(&cli.data_dir, volume.as_deref(), &model)
        }
        Commands::Aggregate {
            coords,
            vocab,
            seeds,
            min_mentions,
            max_containment_depth,
        } => aggregate::cmd_aggregate(
            &cli.data_dir,
            coords,
            vocab.as_deref(),
            seeds.as_deref(),
            min_mentions,
            max_containment_depth,
        ),
        Commands::Status => status::cmd_status(&cli.data_dir),
        Commands::Serve {
            host,
            port,
            static_dir,
        } => serve::cmd_serve(&cli.data_dir, &host, port, static_dir),
    }
}
