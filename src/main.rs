//! # Context Memory CLI (`ctxmem`)
//!
//! ## Usage
//!
//! ```bash
//! ctxmem --config ./config/ctxmem.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxmem init` | Create the SQLite database and schema |
//! | `ctxmem ingest <file>...` | Ingest files as documents |
//! | `ctxmem ingest-dir <dir>` | Scan a directory and ingest matching files |
//! | `ctxmem get <id>` | Print a stored document |
//! | `ctxmem delete <id>` | Delete a document with its vectors and relationships |
//! | `ctxmem context "<query>"` | Documents, relationships and summary for a query |
//! | `ctxmem search "<query>"` | Semantic search with filters and paging |
//! | `ctxmem ask "<question>"` | Stream an answer grounded in retrieved documents |
//! | `ctxmem stats` | Store counts and size estimate |
//! | `ctxmem health` | Readiness of every backing service |
//! | `ctxmem serve` | Start the HTTP API |
//!
//! Logs go to stderr and are controlled by `RUST_LOG`. Ctrl-C cancels the
//! running command.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use context_memory::connector_fs::ScanOptions;
use context_memory::orchestrator::{ContextRequest, IngestOptions, SearchRequest};
use context_memory::{config, get, ingest, migrate, runtime, search, server, stats};

/// Context Memory CLI: document memory with vector search and a
/// relationship graph.
#[derive(Parser)]
#[command(name = "ctxmem", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ctxmem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct IngestArgs {
    /// Chunk size in words (overrides `[chunking].chunk_size`).
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Chunk overlap in words (overrides `[chunking].overlap`).
    #[arg(long)]
    overlap: Option<usize>,

    /// Skip relationship extraction.
    #[arg(long)]
    no_relationships: bool,

    /// Skip the per-document summary.
    #[arg(long)]
    no_summary: bool,
}

impl IngestArgs {
    fn options(&self) -> IngestOptions {
        IngestOptions {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            extract_relationships: !self.no_relationships,
            generate_summary: !self.no_summary,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest one or more text files.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        args: IngestArgs,
    },

    /// Scan a directory and ingest every matching file.
    IngestDir {
        dir: PathBuf,

        /// Include glob, relative to `dir` (repeatable). Defaults to
        /// `**/*.md` and `**/*.txt`.
        #[arg(long = "include")]
        include: Vec<String>,

        /// Exclude glob, relative to `dir` (repeatable).
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        #[arg(long)]
        follow_symlinks: bool,

        #[command(flatten)]
        args: IngestArgs,
    },

    /// Print a document by id.
    Get { id: String },

    /// Delete a document and everything derived from it.
    Delete { id: String },

    /// Retrieve context for a query.
    Context {
        query: String,

        #[arg(long, default_value = "5")]
        max_documents: usize,

        #[arg(long, default_value = "0.5")]
        min_score: f64,

        #[arg(long)]
        no_relationships: bool,

        /// Summarize the retrieved documents.
        #[arg(long)]
        summary: bool,
    },

    /// Semantic search.
    Search {
        query: String,

        #[arg(long, default_value = "10")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,

        /// Metadata equality filter `key=value` (repeatable).
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Answer a question from stored documents (requires a chat-capable provider).
    Ask {
        question: String,

        #[arg(long, default_value = "5")]
        max_documents: usize,
    },

    /// Show store statistics.
    Stats,

    /// Check readiness of every backing service.
    Health,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "context_memory=info,ctxmem=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let orchestrator = runtime::open_orchestrator(&cfg).await?;

    match cli.command {
        Commands::Init => unreachable!("handled before opening stores"),
        Commands::Ingest { files, args } => {
            ingest::run_ingest_files(&orchestrator, &files, &args.options(), &cancel).await?;
        }
        Commands::IngestDir {
            dir,
            include,
            exclude,
            follow_symlinks,
            args,
        } => {
            let mut scan = ScanOptions {
                exclude_globs: exclude,
                follow_symlinks,
                ..ScanOptions::default()
            };
            if !include.is_empty() {
                scan.include_globs = include;
            }
            ingest::run_ingest_dir(&orchestrator, &dir, &scan, &args.options(), &cancel).await?;
        }
        Commands::Get { id } => {
            get::run_get(&orchestrator, &id, &cancel).await?;
        }
        Commands::Delete { id } => {
            get::run_delete(&orchestrator, &id, &cancel).await?;
        }
        Commands::Context {
            query,
            max_documents,
            min_score,
            no_relationships,
            summary,
        } => {
            let request = ContextRequest {
                max_documents,
                min_score,
                include_relationships: !no_relationships,
                generate_summary: summary,
                ..ContextRequest::new(query)
            };
            search::run_context(&orchestrator, &request, &cancel).await?;
        }
        Commands::Search {
            query,
            limit,
            offset,
            filters,
        } => {
            let request = SearchRequest {
                limit,
                offset,
                filters: search::parse_filters(&filters)?,
                ..SearchRequest::new(query)
            };
            search::run_search(&orchestrator, &request, &cancel).await?;
        }
        Commands::Ask {
            question,
            max_documents,
        } => {
            search::run_ask(&orchestrator, &question, max_documents, &cancel).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg, &orchestrator, &cancel).await?;
        }
        Commands::Health => {
            stats::run_health(&orchestrator).await?;
        }
        Commands::Serve => {
            let orchestrator = Arc::new(orchestrator);
            server::run_server(&cfg.server.bind, orchestrator, cancel).await?;
        }
    }

    Ok(())
}
