//! # Ticket Responder (`ticketd`)
//!
//! ## Usage
//!
//! ```bash
//! ticketd [--config ./ticketd.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ticketd serve` | Start the HTTP server (`POST /submit-ticket`) |
//! | `ticketd seed <file>` | Load historical tickets from a JSON-lines file |
//!
//! Credentials and endpoints come from the environment (or a `.env` file):
//! `TOGETHER_API_KEY`, `PINECONE_API_KEY`, `INDEX_NAME`, `INDEX_HOST`,
//! `ZAPIER_WEBHOOK_URL`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ticket_responder::config::{load_config, read_config};
use ticket_responder::embedding::TogetherEmbedder;
use ticket_responder::index::create_index;
use ticket_responder::seed::{read_seed_file, seed_index, DEFAULT_SEED_LIMIT};
use ticket_responder::server::run_server;

/// Ticket Responder: drafts and emails replies to support tickets using
/// similar past tickets as context.
#[derive(Parser)]
#[command(name = "ticketd", version)]
struct Cli {
    /// Path to an optional configuration file (TOML).
    ///
    /// Environment variables override values from the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Embed historical tickets and upsert them into the index.
    ///
    /// The file holds one JSON object per line with `id`, `subject`,
    /// `body`, `priority`, `product_names`, and optionally `email`.
    Seed {
        /// JSON-lines file of past tickets.
        file: PathBuf,

        /// Maximum number of records to load.
        #[arg(long, default_value_t = DEFAULT_SEED_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_config(cli.config.as_deref())?;
            run_server(&config).await?;
        }
        Commands::Seed { file, limit } => {
            let config = read_config(cli.config.as_deref())?;
            config.validate_for_seeding()?;

            let embedder = TogetherEmbedder::new(&config.embedding)?;
            let index = create_index(&config.index)?;
            let records = read_seed_file(&file)?;
            let report = seed_index(&embedder, index.as_ref(), &records, limit).await?;

            println!("seed");
            println!("  records read: {}", report.read);
            println!("  upserted: {}", report.upserted);
            println!("  failed: {}", report.failed);
        }
    }

    Ok(())
}
