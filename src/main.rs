//! # storebot CLI
//!
//! The `storebot` binary is the primary interface for the shopping
//! assistant. It provides commands for building the product database,
//! ingesting FAQ data, answering a single query, and starting the HTTP
//! front door.
//!
//! ## Usage
//!
//! ```bash
//! storebot --config ./config/storebot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `storebot init` | Build the product SQLite database from the bulk CSV |
//! | `storebot ingest` | Ingest the FAQ CSV into the similarity collection |
//! | `storebot ask "<query>"` | Answer one query end-to-end |
//! | `storebot routes` | List registered intent routes |
//! | `storebot serve` | Start the HTTP server |
//!
//! The completion service is configured through the environment:
//! `GROQ_API_KEY` (bearer token) and `GROQ_MODEL` (chat model identifier).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use storebot::config;
use storebot::db;
use storebot::faq::FaqEngine;
use storebot::llm::GroqClient;
use storebot::pipeline::Assistant;
use storebot::server;
use storebot::sql;
use storebot::traits::{ChatCompletion, Embedder};

/// storebot — a retail shopping assistant with intent routing, FAQ
/// retrieval, and NL2SQL product search.
#[derive(Parser)]
#[command(
    name = "storebot",
    about = "A retail shopping assistant that routes queries to FAQ retrieval or NL2SQL product search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/storebot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the product database from the bulk CSV.
    ///
    /// Idempotent — an existing database is left untouched.
    Init,

    /// Ingest the FAQ CSV into the similarity collection.
    ///
    /// Skipped entirely when the collection already exists.
    Ingest,

    /// Answer a single query end-to-end and print the answer.
    Ask {
        /// The free-text query.
        query: String,
    },

    /// List registered intent routes and their utterance counts.
    Routes,

    /// Start the HTTP front door (`POST /ask`, `GET /health`).
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            if cfg.db.product_path.exists() {
                println!("Product database already exists at {}", cfg.db.product_path.display());
            } else {
                sql::build_product_db(&cfg.db.product_path, &cfg.db.product_csv).await?;
                println!("Product database built at {}", cfg.db.product_path.display());
            }
        }
        Commands::Ingest => {
            let client = Arc::new(GroqClient::from_config(&cfg.llm)?);
            let pool = db::connect_rw(&cfg.db.assistant_path).await?;
            let engine = FaqEngine::new(
                pool,
                cfg.faq.collection.clone(),
                cfg.faq.top_k,
                client.clone() as Arc<dyn Embedder>,
                client as Arc<dyn ChatCompletion>,
            );
            engine.ingest(&cfg.faq.csv_path).await?;
            println!("FAQ collection ready ({} entries)", engine.collection_size().await?);
        }
        Commands::Ask { query } => {
            let client = Arc::new(GroqClient::from_config(&cfg.llm)?);
            let assistant = Assistant::new(
                &cfg,
                client.clone() as Arc<dyn Embedder>,
                client as Arc<dyn ChatCompletion>,
            )
            .await?;
            println!("{}", assistant.ask(&query).await);
        }
        Commands::Routes => {
            for route in &cfg.router.routes {
                println!("{}  ({} utterances)", route.name, route.utterances.len());
            }
        }
        Commands::Serve => {
            let client = Arc::new(GroqClient::from_config(&cfg.llm)?);
            let assistant = Assistant::new(
                &cfg,
                client.clone() as Arc<dyn Embedder>,
                client as Arc<dyn ChatCompletion>,
            )
            .await?;
            server::run_server(&cfg, Arc::new(assistant)).await?;
        }
    }

    Ok(())
}
