//! # Vector Agent CLI (`vagent`)
//!
//! ## Usage
//!
//! ```bash
//! vagent --config ./config/vagent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vagent init` | Create the SQLite database and run schema migrations |
//! | `vagent ingest <path>` | Load, chunk and store files from a directory or file |
//! | `vagent ingest --text "<text>"` | Store a single text document |
//! | `vagent search "<query>"` | Knowledge-base search, no web fallback |
//! | `vagent ask "<question>"` | One chat turn against the stored history |
//! | `vagent chat` | Interactive chat loop (`exit` quits) |
//! | `vagent history show\|clear` | Inspect or reset stored chat history |
//! | `vagent serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG` to change the filter
//! (default `vector_agent=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use vector_agent::bootstrap::Agent;
use vector_agent::config::{self, Config};
use vector_agent::engine::ChatTurn;
use vector_agent::loader;
use vector_agent::models::Document;

/// A chat agent over a private knowledge base with web search fallback.
#[derive(Parser)]
#[command(name = "vagent", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is missing.
    #[arg(long, global = true, default_value = "./config/vagent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Chunk, embed and store documents.
    Ingest {
        /// File or directory to load (filtered by `[ingest]` globs).
        #[arg(required_unless_present = "text", conflicts_with = "text")]
        path: Option<PathBuf>,

        /// Ingest this text directly instead of reading files.
        #[arg(long)]
        text: Option<String>,

        /// Source label for `--text`.
        #[arg(long, default_value = "cli")]
        source: String,

        /// Show document and chunk counts without storing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the knowledge base.
    Search {
        query: String,

        /// Maximum number of results (default `[retrieval].search_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ask a single question.
    Ask {
        question: String,

        /// Also print the rewritten query and the sources consulted.
        #[arg(long)]
        verbose: bool,
    },

    /// Interactive chat loop.
    Chat,

    /// Inspect or clear stored chat history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print stored messages, oldest first.
    Show,
    /// Delete all stored messages.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vector_agent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = vector_agent::db::connect(&config).await?;
            vector_agent::migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Ingest {
            path,
            text,
            source,
            dry_run,
        } => {
            run_ingest(config, path, text, source, dry_run).await?;
        }
        Commands::Search { query, limit } => {
            let agent = Agent::from_config(config).await?;
            let results = agent.search(&query, limit).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, item) in results.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, item.score, item.content);
            }
        }
        Commands::Ask { question, verbose } => {
            let agent = Agent::from_config(config).await?;
            let turn = agent.chat(&question, None).await?;
            print_turn(&turn, verbose);
        }
        Commands::Chat => {
            run_chat(config).await?;
        }
        Commands::History { action } => {
            let agent = Agent::from_config(config).await?;
            match action {
                HistoryAction::Show => {
                    let limit = agent.config().history.store_limit;
                    let messages = agent.history().list_recent(limit).await?;
                    if messages.is_empty() {
                        println!("No chat history.");
                    }
                    for m in messages {
                        println!("{}: {}", m.role.label(), m.content);
                    }
                }
                HistoryAction::Clear => {
                    agent.history().clear().await?;
                    println!("Chat history cleared.");
                }
            }
        }
        Commands::Serve => {
            vector_agent::server::run_server(&config).await?;
        }
    }

    Ok(())
}

async fn run_ingest(
    config: Config,
    path: Option<PathBuf>,
    text: Option<String>,
    source: String,
    dry_run: bool,
) -> anyhow::Result<()> {
    let agent = Agent::from_config(config).await?;

    let (documents, skipped) = match (path, text) {
        (_, Some(text)) => (vec![Document::text(source, text)], Vec::new()),
        (Some(path), None) => {
            let loaded = loader::load_path(
                &path,
                &agent.config().ingest,
                agent.model(),
                agent.config().timeouts.model(),
            )
            .await?;
            (loaded.documents, loaded.skipped)
        }
        (None, None) => anyhow::bail!("either a path or --text is required"),
    };

    for s in &skipped {
        println!("  skipped {}", s);
    }

    if dry_run {
        let params = agent.config().chunking.params()?;
        let chunks: usize = documents
            .iter()
            .map(|d| vector_agent::chunk::chunk_document(d, &params).len())
            .sum();
        println!(
            "Dry run: {} documents, {} chunks (nothing stored)",
            documents.len(),
            chunks
        );
        return Ok(());
    }

    let report = agent.ingest(&documents).await?;
    println!(
        "Ingested {} documents ({} chunks, {} empty, {} files skipped)",
        report.documents,
        report.chunks,
        report.skipped,
        skipped.len()
    );
    Ok(())
}

async fn run_chat(config: Config) -> anyhow::Result<()> {
    let agent = Agent::from_config(config).await?;
    if agent.is_dummy() {
        println!("No generative model configured; answers will be dummy responses.");
    }
    println!("Type a message, or 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        match agent.chat(message, None).await {
            Ok(turn) => print_turn(&turn, false),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

fn print_turn(turn: &ChatTurn, verbose: bool) {
    if verbose {
        println!("Query:   {}", turn.standalone_query);
        println!("Sources: {}", turn.sources_used);
        println!();
    }
    println!("{}", turn.response);
}
