//! # Musannaf CLI (`musannaf`)
//!
//! Reads the chunked hadith corpus through the caching gateway, one view
//! per invocation, and runs the gateway as an HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! musannaf --config ./config/musannaf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `musannaf page <n>` | Show page `n` |
//! | `musannaf jump <id>` | Show a single record by absolute id |
//! | `musannaf open "<query>"` | Show the view described by `page=`/`jump=`/`file=` |
//! | `musannaf locate <id>` | Print the chunk and offset holding a record |
//! | `musannaf cache install` | Pre-populate core assets into the current store |
//! | `musannaf cache activate` | Delete cache stores of other versions |
//! | `musannaf cache list` | List cache stores and entry counts |
//! | `musannaf serve` | Run the HTTP gateway |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use musannaf::{cache_cmd, config, server, view_cmd, ViewRequest};

/// Musannaf reader: a paginated viewer for a chunked hadith corpus.
#[derive(Parser)]
#[command(
    name = "musannaf",
    about = "Musannaf reader: a paginated viewer for a chunked hadith corpus",
    version,
    long_about = "Maps pages and record numbers onto the corpus chunk files, fetches them \
    through an offline-first caching gateway, and prints one view per invocation. \
    The same gateway can be served over HTTP for browsers."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/musannaf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one page of records.
    Page {
        /// Page number, starting at 1.
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        page: u64,

        /// Print the rendered view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a single record by its absolute number.
    ///
    /// The number is validated against the corpus size before anything
    /// is fetched.
    Jump {
        /// Record number, between 1 and the corpus size.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the view described by a query string.
    ///
    /// Accepts `page`, `jump` and the legacy `file` parameter, e.g.
    /// `"?page=12"` or `"jump=1500&file=002"`.
    Open {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Print the chunk file, local offset and page of a record.
    Locate {
        id: String,
    },

    /// Manage the versioned cache stores.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Run the HTTP gateway.
    ///
    /// Installs core assets, deletes stale stores, then serves every GET
    /// through the cache on the address configured in `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Fetch and store all core assets in the current store.
    Install,
    /// Delete every store that does not match the current version.
    Activate,
    /// List stores and their entry counts.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Page { page, json } => {
            view_cmd::run_view(&cfg, ViewRequest::page(page), json).await?;
        }
        Commands::Jump { id, json } => {
            view_cmd::run_jump(&cfg, &id, json).await?;
        }
        Commands::Open { query, json } => {
            view_cmd::run_view(&cfg, ViewRequest::from_query(&query), json).await?;
        }
        Commands::Locate { id } => {
            view_cmd::run_locate(&cfg, &id)?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Install => cache_cmd::run_install(&cfg).await?,
            CacheAction::Activate => cache_cmd::run_activate(&cfg).await?,
            CacheAction::List => cache_cmd::run_list(&cfg).await?,
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
