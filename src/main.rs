//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create storage directories and the database schema |
//! | `docqa serve` | Start the HTTP API |
//! | `docqa index [--dir <path>]` | Index a documents directory |
//! | `docqa ask --user <id> "<query>"` | Answer a question from the command line |
//! | `docqa history <user> [--clear]` | Show or clear a user's conversation |
//! | `docqa stats` | Index and memory statistics |
//! | `docqa clear-db --yes` | Delete every indexed chunk |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `docqa=info,tower_http=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docqa::{commands, config, server, stats};

/// docqa: ask questions about a folder of documents.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Document question answering with retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Optional: defaults and
    /// environment variables apply when the file is absent.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the documents and conversations directories and the vector
    /// database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP API on `server.bind`.
    Serve,

    /// Index every supported file in a directory.
    Index {
        /// Directory to index. Defaults to `paths.documents_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Ask a question as the given user.
    Ask {
        /// User id whose conversation history is used and extended.
        #[arg(long)]
        user: String,

        /// The question.
        query: String,
    },

    /// Show a user's conversation history.
    History {
        user: String,

        /// Clear the history instead of printing it.
        #[arg(long)]
        clear: bool,
    },

    /// Show index and memory statistics.
    Stats,

    /// Delete every indexed chunk.
    ClearDb {
        /// Confirm the irreversible deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Index { dir } => commands::run_index(&cfg, dir.as_deref()).await?,
        Commands::Ask { user, query } => commands::run_ask(&cfg, &user, &query).await?,
        Commands::History { user, clear } => commands::run_history(&cfg, &user, clear).await?,
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::ClearDb { yes } => commands::run_clear_db(&cfg, yes).await?,
    }

    Ok(())
}
