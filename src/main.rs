//! # logsift CLI (`sift`)
//!
//! The `sift` binary is the primary interface for logsift. It provides
//! commands for database initialization, log ingestion, job inspection,
//! search, analytics, embedding management, root-cause analysis, and the
//! HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! sift --config ./config/sift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sift init` | Create the SQLite database and run schema migrations |
//! | `sift ingest <file>` | Parse, score, and store one log file |
//! | `sift jobs [id]` | List recent ingest jobs, or show one |
//! | `sift search "<query>"` | Search stored records |
//! | `sift stats` | Aggregate analytics |
//! | `sift embed pending` | Backfill missing embeddings |
//! | `sift embed rebuild` | Delete and regenerate all embeddings |
//! | `sift analyze` | LLM root-cause analysis over top anomalies |
//! | `sift serve` | Start the JSON HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use logsift::{analytics, analyze, config, embed_cmd, ingest, jobs, migrate, search, server};

/// logsift CLI — a log ingestion and anomaly detection pipeline with
/// semantic search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sift.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sift",
    about = "logsift — a log ingestion and anomaly detection pipeline with semantic search",
    version,
    long_about = "logsift parses raw log files into structured records, scores each record's \
    hour-of-day error-rate anomaly per service, and stores everything in SQLite with keyword, \
    semantic, and hybrid search plus LLM-assisted root-cause analysis."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (jobs,
    /// logs, logs_fts, log_vectors). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Parse, score, and store one log file.
    ///
    /// Every non-blank line yields a record: known formats are classified
    /// by the first matching rule, everything else falls back to an
    /// UNKNOWN-level record. The whole batch is anomaly-scored before
    /// being written, and the run is tracked as a job.
    Ingest {
        /// Path to the log file.
        file: PathBuf,

        /// Parse and score without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of records to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List recent ingest jobs, or show one job's status.
    Jobs {
        /// Job id to show in detail. Omit to list recent jobs.
        id: Option<String>,

        /// Maximum number of jobs to list.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Search stored records.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `keyword` (FTS5), `semantic` (vector), or `hybrid`
        /// (weighted merge). Semantic and hybrid require an embedding
        /// provider.
        #[arg(long, default_value = "keyword")]
        mode: String,

        /// Filter results to one service.
        #[arg(long)]
        service: Option<String>,

        /// Only return records from on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print aggregate analytics: volume, error rate, top services,
    /// flagged anomalies, hourly distribution.
    Stats,

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Run LLM root-cause analysis over the most anomalous records.
    ///
    /// Requires `[analysis]` provider configuration. Malformed model
    /// output degrades to a fixed placeholder report.
    Analyze {
        /// Restrict the analyzed records to one service.
        #[arg(long)]
        service: Option<String>,

        /// Number of records to hand to the analyzer.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the JSON HTTP API server.
    Serve,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed stored records that have no vector yet.
    Pending {
        /// Maximum number of records to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate all embeddings.
    Rebuild {
        /// Override the batch size from config.
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            dry_run,
            limit,
        } => {
            ingest::run_ingest(&cfg, &file, dry_run, limit).await?;
        }
        Commands::Jobs { id, limit } => {
            jobs::run_jobs(&cfg, id, limit).await?;
        }
        Commands::Search {
            query,
            mode,
            service,
            since,
            limit,
        } => {
            let filters = search::SearchFilters { service, since };
            search::run_search(&cfg, &query, &mode, filters, limit).await?;
        }
        Commands::Stats => {
            analytics::run_analytics(&cfg).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
        Commands::Analyze { service, limit } => {
            analyze::run_analyze(&cfg, service, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
