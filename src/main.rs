//! # Transcript Harness CLI (`trx`)
//!
//! The `trx` binary is the operational interface for the transcript
//! pipeline: database initialization, the one-job worker loop, direct
//! ingestion, index rebuilds, and semantic search.
//!
//! ## Usage
//!
//! ```bash
//! trx --config ./config/trx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trx init` | Create the SQLite database and run schema migrations |
//! | `trx work` | Claim and process at most one pending job, then exit |
//! | `trx ingest <ref>` | Fetch, store, chunk, and index one media reference |
//! | `trx reindex` | Rebuild the vector index from stored transcripts |
//! | `trx search "<query>"` | Semantic search over indexed chunks |
//! | `trx jobs` | Show job-queue counts by status |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use transcript_harness::{config, db, migrate, queue, search, worker};

/// Transcript Harness CLI — a transcript ingestion and semantic retrieval
/// pipeline for video libraries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/trx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "trx",
    about = "Transcript Harness — a transcript ingestion and semantic retrieval pipeline",
    version,
    long_about = "Transcript Harness claims transcript-fetch jobs from a shared queue, stores \
    time-aligned transcripts as JSON objects, folds them into context-window chunks, and serves \
    semantic retrieval over the resulting vector index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/trx.toml`. Database, transcript-source,
    /// storage, chunking, and embedding settings are read from this file.
    #[arg(long, global = true, default_value = "./config/trx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (transcript_jobs, transcripts, index_documents). This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Claim and process at most one pending job.
    ///
    /// Selects the oldest pending job, moves it to running, runs the
    /// fetch → store → chunk → index pipeline, records the outcome, sleeps
    /// the configured cooldown, and exits. Prints a notice and exits when
    /// no pending job exists.
    Work,

    /// Ingest one media reference directly, outside the job queue.
    ///
    /// Accepts a watch-page URL, short link, embed link, or bare media id.
    Ingest {
        /// Media reference (URL or bare id).
        media_ref: String,

        /// Re-fetch and re-ingest even when the transcript object is
        /// already stored.
        #[arg(long)]
        force: bool,
    },

    /// Rebuild the vector index from every stored transcript.
    ///
    /// Scans the materialized transcripts table for `present` rows,
    /// downloads each blob, chunks it, and upserts its documents.
    /// Idempotent thanks to deterministic document ids.
    Reindex,

    /// Search indexed transcript chunks.
    ///
    /// Embeds the query and returns the nearest chunks with media id,
    /// timestamp, and deep link.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one media id.
        #[arg(long)]
        media: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show job-queue counts by status.
    Jobs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Work => {
            worker::run_worker(&cfg).await?;
        }
        Commands::Ingest { media_ref, force } => {
            let mut cfg = cfg;
            if force {
                cfg.worker.skip_if_exists = false;
            }
            worker::run_ingest(&cfg, &media_ref).await?;
        }
        Commands::Reindex => {
            worker::run_reindex(&cfg).await?;
        }
        Commands::Search {
            query,
            media,
            limit,
        } => {
            search::run_search(&cfg, &query, media, limit).await?;
        }
        Commands::Jobs => {
            let pool = db::connect(&cfg).await?;
            let queue = queue::SqliteJobQueue::new(pool.clone());
            let counts = queue.counts_by_status().await?;
            println!("{:<10} {:>6}", "STATUS", "JOBS");
            if counts.is_empty() {
                println!("(no jobs)");
            }
            for (status, n) in counts {
                println!("{:<10} {:>6}", status, n);
            }
            pool.close().await;
        }
    }

    Ok(())
}
