//! # repochat CLI
//!
//! The `repochat` binary prepares the database, serves the chat endpoint,
//! and runs single chat turns from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! repochat --config ./config/repochat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repochat init` | Create the SQLite database and its tables |
//! | `repochat serve` | Start the chat HTTP server |
//! | `repochat ask "<question>"` | Run one chat turn and print the answer |
//! | `repochat get <id>` | Print a full-text record by id |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repochat::{ask, config, get, migrate, server};

/// repochat: retrieval-augmented chat over an ingested source repository.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/repochat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "repochat",
    about = "Retrieval-augmented chat over an ingested source-code repository",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/repochat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the `document_file` and
    /// `document_index` tables. Safe to run repeatedly.
    Init,

    /// Start the chat HTTP server on `[server].bind`.
    Serve,

    /// Ask one question and stream the answer to stdout.
    Ask {
        /// The question.
        question: String,
    },

    /// Print a full-text record by id.
    Get {
        /// Record id (UUID).
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
    }

    Ok(())
}
