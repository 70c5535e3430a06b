//! # DocuQuery CLI (`dq`)
//!
//! ## Usage
//!
//! ```bash
//! dq [--config ./config/dq.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dq serve` | Start the HTTP API |
//! | `dq ask "<question>" --file <path>` | Answer a question from the given documents |
//! | `dq extract "<question>" --file <path>` | Show the ranked passages only |
//! | `dq chunk <path>` | Preview passage boundaries for a file |
//!
//! ## Examples
//!
//! ```bash
//! # Answer from two files, printing JSON
//! dq ask "What is the refund policy?" --file terms.pdf --file faq.docx --json
//!
//! # Restrict retrieval to one of the loaded files
//! dq extract "deployment" --file ops.md --file notes.txt --only ops.md
//!
//! # Serve the API on the configured address
//! RUST_LOG=docuquery=debug dq serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docuquery::ask::{self, QueryInputs};
use docuquery::config::{self, Config};
use docuquery::{chunk, server};

/// Default location checked when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "./config/dq.toml";

/// DocuQuery CLI: question answering over your documents.
#[derive(Parser)]
#[command(
    name = "dq",
    about = "DocuQuery: ask questions about your documents",
    version,
    long_about = "DocuQuery chunks PDF, DOCX, and text documents into overlapping passages, \
    ranks them against a question with TF-IDF or embeddings, and answers with cited sources \
    and a confidence label. Answers are extractive, or generated by an OpenAI-compatible model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dq.toml` when that file exists, otherwise
    /// built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Document inputs shared by `ask` and `extract`.
#[derive(clap::Args)]
struct InputArgs {
    /// File to load (.pdf, .docx, .txt, .md). Repeatable.
    #[arg(long = "file", short = 'f')]
    files: Vec<PathBuf>,

    /// Literal text to load as a document. Repeatable.
    #[arg(long = "text")]
    texts: Vec<String>,

    /// Number of passages to retrieve (default from config).
    #[arg(long)]
    top_k: Option<usize>,

    /// Only search documents with this title (a file name or `text-N`). Repeatable.
    #[arg(long)]
    only: Vec<String>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

impl From<InputArgs> for QueryInputs {
    fn from(args: InputArgs) -> Self {
        QueryInputs {
            files: args.files,
            texts: args.texts,
            top_k: args.top_k,
            only: args.only,
            json: args.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    ///
    /// Binds to `[server].bind` and serves the `/api/*` endpoints until
    /// terminated. The corpus is in memory and starts empty.
    Serve {
        /// Override the bind address from config.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Answer a question from the given documents.
    Ask {
        /// The question.
        query: String,

        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Show the passages ranked for a question, without composing an answer.
    Extract {
        /// The question.
        query: String,

        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Preview how a file is split into passages.
    Chunk {
        /// File to split.
        path: PathBuf,

        /// Override `[chunking].chunk_size`.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override `[chunking].overlap`.
        #[arg(long)]
        overlap: Option<usize>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(&default)
            } else {
                tracing::debug!("no config file found, using defaults");
                Ok(Config::minimal())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = resolve_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Ask { query, inputs } => {
            ask::run_ask(&cfg, &query, &inputs.into()).await?;
        }
        Commands::Extract { query, inputs } => {
            ask::run_extract(&cfg, &query, &inputs.into()).await?;
        }
        Commands::Chunk {
            path,
            chunk_size,
            overlap,
            json,
        } => {
            chunk::run_chunk(&cfg, &path, chunk_size, overlap, json)?;
        }
    }

    Ok(())
}
