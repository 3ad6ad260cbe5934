//! # `docqa` — document question answering from the command line
//!
//! Point the binary at a TOML config (`--config`, default
//! `./config/docqa.toml`) and drive the pipeline through subcommands:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa ingest [PATHS]... [--link URL]...` | Ingest files, directories, and web links |
//! | `docqa ask "<question>"` | Answer a question from the ingested documents |
//! | `docqa chat` | Interactive question loop with conversation history |
//! | `docqa list` | List ingested sources |
//! | `docqa show <source>` | Print a source's stored text and index footprint |
//! | `docqa delete <source>` | Remove a source from the database and the index |
//! | `docqa clear [--all]` | Delete the vector index (with `--all` also the metadata) |
//! | `docqa stats` | Corpus statistics |
//!
//! ## Typical session
//!
//! ```bash
//! docqa init
//! docqa ingest ./docs --link https://example.com/handbook
//! docqa ask "How long do refunds take?"
//! docqa chat
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docqa::config;
use docqa::context::AppContext;
use docqa::progress::ProgressMode;
use docqa::{ingest, manage, query, stats};

/// Retrieval-augmented question answering over local documents and web
/// pages.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Document QA — retrieval-augmented question answering over local documents",
    version,
    long_about = "Document QA ingests PDFs, plain-text files, and web pages, chunks and embeds \
    their text into a persistent vector index, and answers natural-language questions by \
    retrieving the most relevant chunks and asking a language model to synthesize an answer \
    grounded in them, with sources cited."
)]
struct Cli {
    /// TOML configuration file controlling storage, chunking, retrieval,
    /// and provider settings.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the metadata database.
    ///
    /// Builds the SQLite file and its schema. Safe to run repeatedly;
    /// existing data is untouched.
    Init,

    /// Ingest documents into the corpus.
    ///
    /// Extracts text from the given files, directories, and web links,
    /// chunks and embeds it, and persists the chunks to the vector index.
    /// Sources already ingested under the same name are skipped. A failing
    /// source is reported and the rest of the batch continues.
    Ingest {
        /// Files or directories to ingest. Directories are walked
        /// recursively for supported files (.pdf, .txt, .md).
        paths: Vec<PathBuf>,

        /// Web page URL to ingest. May be given multiple times.
        #[arg(long = "link")]
        links: Vec<String>,

        /// Progress output: `auto` (human-readable when stderr is a TTY),
        /// `off`, or `json`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Answer a single question from the ingested documents.
    ///
    /// Retrieves the most relevant chunks, asks the completion provider
    /// for an answer grounded in them, and prints it with the list of
    /// contributing sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Override the number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Interactive question loop.
    ///
    /// Keeps the conversation in memory and replays it to the model each
    /// turn. Type `exit` to quit, `reset` to clear the history.
    Chat,

    /// List ingested sources.
    List,

    /// Print a source's stored text snapshot and index footprint.
    Show {
        /// Source key: the file name or URL it was ingested under.
        source: String,
    },

    /// Remove a source from the metadata database and the vector index.
    Delete {
        /// Source key: the file name or URL it was ingested under.
        source: String,
    },

    /// Delete the persisted vector index.
    ///
    /// Ingested source metadata is kept unless `--all` is given.
    Clear {
        /// Also delete all source metadata.
        #[arg(long)]
        all: bool,
    },

    /// Show corpus statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    if let Commands::Ask { top_k: Some(k), .. } = &cli.command {
        cfg.retrieval.top_k = *k;
    }

    let ctx = AppContext::init(cfg).await?;

    match cli.command {
        Commands::Init => {
            println!(
                "database initialized: {}",
                ctx.config.storage.db_path.display()
            );
        }
        Commands::Ingest {
            paths,
            links,
            progress,
        } => {
            let reporter = parse_progress_mode(&progress)?.reporter();
            ingest::run_ingest(&ctx, &paths, &links, reporter.as_ref()).await?;
        }
        Commands::Ask { question, .. } => {
            query::run_ask(&ctx, &question).await?;
        }
        Commands::Chat => {
            query::run_chat(&ctx).await?;
        }
        Commands::List => {
            manage::run_list(&ctx).await?;
        }
        Commands::Show { source } => {
            manage::run_show(&ctx, &source).await?;
        }
        Commands::Delete { source } => {
            manage::run_delete(&ctx, &source).await?;
        }
        Commands::Clear { all } => {
            manage::run_clear(&ctx, all).await?;
        }
        Commands::Stats => {
            stats::run_stats(&ctx).await?;
        }
    }

    Ok(())
}

/// Parse the `--progress` flag.
fn parse_progress_mode(s: &str) -> anyhow::Result<ProgressMode> {
    match s {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "off" => Ok(ProgressMode::Off),
        "json" => Ok(ProgressMode::Json),
        other => anyhow::bail!(
            "unknown progress mode '{}' (expected auto, off, or json)",
            other
        ),
    }
}
