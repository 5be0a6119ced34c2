//! # Memobot CLI (`mbot`)
//!
//! The `mbot` binary is the interface to Memobot: a conversational assistant
//! with per-user document memory. Commands cover database initialization,
//! account management, document ingestion, retrieval inspection, asking
//! questions, session management, and transcript export.
//!
//! ## Usage
//!
//! ```bash
//! mbot --config ./config/memobot.toml <command>
//! ```
//!
//! Commands that touch a user's data require credentials:
//!
//! ```bash
//! mbot --user alice --password secret123 <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mbot init` | Create the SQLite database and schema |
//! | `mbot register <user> <pass>` | Create a new account |
//! | `mbot login <user> <pass>` | Verify credentials |
//! | `mbot ingest <file>` | Ingest a PDF/TXT/MD document |
//! | `mbot files` | List uploaded documents |
//! | `mbot forget <filename>` | Delete a document's chunks |
//! | `mbot context "<query>"` | Show what retrieval would return |
//! | `mbot ask "<prompt>"` | Ask a question in the active session |
//! | `mbot session list\|new\|switch\|delete` | Manage chat sessions |
//! | `mbot export` | Export a session transcript |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use memobot::{auth, config, db, export, ingest, migrate, retrieve, turn};

/// Memobot — a conversational assistant with per-user document memory.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/memobot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mbot",
    about = "Memobot — a conversational assistant with per-user document memory",
    version,
    long_about = "Memobot ingests a user's documents, chunks and embeds them into a local \
    SQLite store, and answers questions by retrieving the most relevant chunks and streaming \
    a grounded reply from a hosted chat model. Documents and conversations are per-user and \
    persist across runs."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/memobot.toml")]
    config: PathBuf,

    /// Username for commands that touch user data.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Password for commands that touch user data.
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (users,
    /// doc_chunks, sessions). Idempotent — running it again is safe.
    Init,

    /// Create a new user account.
    ///
    /// Usernames must be at least 3 characters and unique; passwords at
    /// least 6 characters.
    Register {
        /// Username for the new account.
        username: String,
        /// Password for the new account.
        password: String,
    },

    /// Verify credentials without doing anything else.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    /// Ingest a document into the authenticated user's memory.
    ///
    /// Extracts text page by page, splits it into overlapping chunks, embeds
    /// every chunk, and stores the result. Re-ingesting a filename replaces
    /// its previous chunks. Requires --user and --password, and an embedding
    /// provider configured.
    Ingest {
        /// Path to the document (.pdf, .txt, or .md).
        file: PathBuf,
    },

    /// List the authenticated user's uploaded documents.
    Files,

    /// Delete all stored chunks of one document.
    Forget {
        /// Filename as shown by `mbot files`.
        filename: String,
    },

    /// Show the context snippets retrieval would hand the model.
    ///
    /// Debugging aid: embeds the query and prints the top-scoring chunks
    /// with their source document, page, and similarity.
    Context {
        /// The query string.
        query: String,

        /// Maximum number of snippets to show.
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },

    /// Ask a question in the active chat session.
    ///
    /// Retrieves relevant document context, streams the model's reply to
    /// stdout, and persists the exchange. The first completed exchange names
    /// the session after the question.
    Ask {
        /// The question or prompt.
        prompt: String,

        /// Ask in a specific session instead of the active one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Manage chat sessions.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Export a session transcript as plain text.
    Export {
        /// Session id to export (defaults to the active session).
        #[arg(long)]
        session: Option<String>,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Session management subcommands.
#[derive(Subcommand)]
enum SessionAction {
    /// List sessions; the active one is marked with `*`.
    List,
    /// Create a new session and make it active.
    New,
    /// Make an existing session active.
    Switch {
        /// Session id.
        id: String,
    },
    /// Delete a session. The last remaining session cannot be deleted.
    Delete {
        /// Session id.
        id: String,
    },
}

/// Resolve `--user`/`--password` into a user id, or fail with a usable
/// message.
async fn require_auth(cfg: &config::Config, cli: &Cli) -> Result<i64> {
    let (Some(user), Some(password)) = (&cli.user, &cli.password) else {
        bail!("This command requires --user and --password");
    };
    let pool = db::pool(cfg).await?;
    auth::authenticate(pool, user, password).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match &cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Register { username, password } => {
            let pool = db::pool(&cfg).await?;
            auth::register(pool, username, password).await?;
            println!("Account created: {}", username);
        }
        Commands::Login { username, password } => {
            let pool = db::pool(&cfg).await?;
            auth::authenticate(pool, username, password).await?;
            println!("Welcome back, {}!", username);
        }
        Commands::Ingest { file } => {
            let user_id = require_auth(&cfg, &cli).await?;
            ingest::run_ingest(&cfg, user_id, file).await?;
        }
        Commands::Files => {
            let user_id = require_auth(&cfg, &cli).await?;
            ingest::run_files(&cfg, user_id).await?;
        }
        Commands::Forget { filename } => {
            let user_id = require_auth(&cfg, &cli).await?;
            ingest::run_forget(&cfg, user_id, filename).await?;
        }
        Commands::Context { query, top_k } => {
            let user_id = require_auth(&cfg, &cli).await?;
            retrieve::run_context(&cfg, user_id, query, *top_k).await?;
        }
        Commands::Ask { prompt, session } => {
            let user_id = require_auth(&cfg, &cli).await?;
            turn::run_ask(&cfg, user_id, prompt, session.as_deref()).await?;
        }
        Commands::Session { action } => {
            let user_id = require_auth(&cfg, &cli).await?;
            match action {
                SessionAction::List => turn::run_session_list(&cfg, user_id).await?,
                SessionAction::New => turn::run_session_new(&cfg, user_id).await?,
                SessionAction::Switch { id } => {
                    turn::run_session_switch(&cfg, user_id, id).await?
                }
                SessionAction::Delete { id } => {
                    turn::run_session_delete(&cfg, user_id, id).await?
                }
            }
        }
        Commands::Export { session, output } => {
            let user_id = require_auth(&cfg, &cli).await?;
            export::run_export(&cfg, user_id, session.as_deref(), output.as_deref()).await?;
        }
    }

    Ok(())
}
