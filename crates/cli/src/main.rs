//! CourseLLM IST service CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP API server
//! - `extract`  — Run a single extraction and print the JSON result
//! - `doctor`   — Diagnose configuration and provider access

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "coursellm",
    about = "CourseLLM IST Service — intent, skill and trajectory extraction",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Extract intent, skills and trajectory from one utterance
    Extract {
        /// The student's message
        #[arg(short, long)]
        utterance: String,

        /// Course name, topic or syllabus snippet
        #[arg(short, long)]
        course_context: Option<String>,
    },

    /// Diagnose configuration and provider access
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Extract {
            utterance,
            course_context,
        } => commands::extract::run(utterance, course_context).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
