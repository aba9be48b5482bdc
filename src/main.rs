//! # qa-chat CLI (`qachat`)
//!
//! The `qachat` binary initializes the database, serves the web UI, and
//! exposes the chat, history, feedback, and sample operations from the
//! terminal.
//!
//! ## Usage
//!
//! ```bash
//! qachat --config ./config/qachat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qachat init` | Create the schema and seed sample data |
//! | `qachat serve` | Start the web UI |
//! | `qachat ask "<question>"` | Ask one question and save the turn |
//! | `qachat history` | List conversation turns, newest first |
//! | `qachat feedback <id> <value>` | Rate a turn (positive, negative, none) |
//! | `qachat samples <action>` | List, add, update, or delete samples |
//! | `qachat stats` | Show database statistics |
//! | `qachat export` | Dump turns and samples as JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! qachat init --config ./config/qachat.toml
//!
//! # Ask a question using the configured model
//! qachat ask "日本の首都はどこですか？"
//!
//! # Review history with scores against matching samples
//! qachat history --limit 10 --scores
//!
//! # Start the web UI
//! qachat serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qa_chat::models::Feedback;
use qa_chat::samples::SampleCommand;
use qa_chat::store::Store;
use qa_chat::{ask, config, export, history, samples, seed, server, stats};

/// qa-chat CLI: question answering with history, feedback, and sample data.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qachat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qachat",
    about = "qa-chat — question answering with conversation history and feedback",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qachat.toml`. Database, generation, metrics,
    /// and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/qachat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed sample data.
    ///
    /// Idempotent: running it again creates nothing new and inserts no
    /// further samples once any exist.
    Init,

    /// Start the web UI.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Ask a single question.
    ///
    /// The answer is saved as a new turn only if generation succeeds.
    Ask {
        /// The question text.
        question: String,
    },

    /// List conversation turns, newest first.
    History {
        /// Maximum number of turns to show (at least 1).
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        limit: Option<i64>,

        /// Score each turn (word count, relevance, BLEU/similarity against
        /// a sample with the same question).
        #[arg(long)]
        scores: bool,
    },

    /// Set feedback on a turn.
    Feedback {
        /// Turn id.
        id: i64,

        /// `positive`, `negative`, or `none`.
        value: Feedback,
    },

    /// Manage sample question/answer records.
    Samples {
        #[command(subcommand)]
        action: SamplesAction,
    },

    /// Show database statistics.
    Stats,

    /// Export turns and samples as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Sample record subcommands.
#[derive(Subcommand)]
enum SamplesAction {
    /// List all samples.
    List,
    /// Add a sample.
    Add { question: String, answer: String },
    /// Replace the question and answer of a sample.
    Update {
        id: i64,
        question: String,
        answer: String,
    },
    /// Delete a sample.
    Delete { id: i64 },
}

impl From<SamplesAction> for SampleCommand {
    fn from(action: SamplesAction) -> Self {
        match action {
            SamplesAction::List => SampleCommand::List,
            SamplesAction::Add { question, answer } => SampleCommand::Add { question, answer },
            SamplesAction::Update {
                id,
                question,
                answer,
            } => SampleCommand::Update {
                id,
                question,
                answer,
            },
            SamplesAction::Delete { id } => SampleCommand::Delete { id },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = Store::open(&cfg).await?;
            let seeded = seed::ensure_initial_data(&store).await;
            store.close().await;
            let seeded = seeded?;
            println!("Database initialized successfully.");
            if seeded > 0 {
                println!("Seeded {} sample records.", seeded);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::History { limit, scores } => {
            history::run_history(&cfg, limit, scores).await?;
        }
        Commands::Feedback { id, value } => {
            history::run_feedback(&cfg, id, value).await?;
        }
        Commands::Samples { action } => {
            samples::run_samples(&cfg, action.into()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
    }

    Ok(())
}
