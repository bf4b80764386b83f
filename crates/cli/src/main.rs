//! designloop CLI, the main entry point.
//!
//! Commands:
//! - `init`    Write a default config file
//! - `run`     Improve one image toward a design goal
//! - `status`  Show resolved configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "designloop",
    about = "designloop: autonomous image design improvement",
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
    /// Write ~/.designloop/config.toml with default settings
    Init,

    /// Run the improvement loop on an image
    Run {
        /// Image file, http(s) URL, or data URL
        #[arg(short, long)]
        image: String,

        /// What the finished room should look like
        #[arg(short, long)]
        goal: String,

        /// Override the iteration cap
        #[arg(long)]
        iterations: Option<u32>,

        /// Override the spending ceiling (USD)
        #[arg(long)]
        max_cost: Option<f64>,

        /// Override the pause between iterations
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Simulate edits instead of calling the editor
        #[arg(long)]
        test_mode: bool,

        /// Style keywords, comma separated
        #[arg(long, value_delimiter = ',')]
        style: Vec<String>,

        /// Where to write the final image
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write the final run state as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Run {
            image,
            goal,
            iterations,
            max_cost,
            delay_ms,
            test_mode,
            style,
            out,
            report,
        } => {
            let options = commands::run::RunOptions {
                image,
                goal,
                iterations,
                max_cost,
                delay_ms,
                test_mode,
                style,
                out,
                report,
            };
            commands::run::run(options).await?
        }
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
