//! answerdesk CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP gateway
//! - `ask`      — Answer a single question
//! - `feedback` — Like or dislike an answer
//! - `import`   — Load a corpus file into the knowledge snapshot
//! - `stats`    — Show knowledge statistics
//! - `onboard`  — Write a default config
//! - `doctor`   — Diagnose system health

use std::path::PathBuf;

use answerdesk_core::feedback::Rating;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "answerdesk",
    about = "answerdesk — retrieval-first question answering with feedback learning",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a single question
    Ask {
        /// The question (multiple words are joined)
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Record a like or dislike for a served answer
    Feedback {
        /// The question that was asked
        #[arg(short, long)]
        question: String,

        /// The answer text that was served
        #[arg(short, long)]
        answer: String,

        /// positive | negative (like/dislike accepted)
        #[arg(short, long)]
        rating: Rating,

        /// Record the answer came from, if known
        #[arg(long)]
        record_id: Option<String>,
    },

    /// Import a JSON or JSONL corpus into the knowledge snapshot
    Import {
        file: PathBuf,

        /// Replace records whose id already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Show knowledge statistics
    Stats,

    /// Initialize configuration
    Onboard,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask { query } => commands::ask::run(query.join(" ")).await?,
        Commands::Feedback {
            question,
            answer,
            rating,
            record_id,
        } => commands::feedback::run(question, answer, rating, record_id).await?,
        Commands::Import { file, overwrite } => commands::import::run(&file, overwrite).await?,
        Commands::Stats => commands::stats::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
