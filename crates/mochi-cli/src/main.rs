//! Mochi CLI - device console and host utilities for the Mochi companion.

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use std::path::PathBuf;

mod commands;
mod face;

/// Mochi - a tiny chatty companion
#[derive(Parser)]
#[command(name = "mochi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the line-oriented device console (default)
    Console,

    /// Write a seeded random placeholder model for the on-device backend
    GenModel {
        /// Output file (default: ~/.mochi/models/tiny-llm.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// RNG seed for the weights
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Show the active configuration
    Info,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = mochi_ai::AgentConfig::from_env();

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Console => tokio::runtime::Runtime::new()
            .into_diagnostic()?
            .block_on(commands::console::run(&config)),
        Commands::GenModel { output, seed } => commands::gen_model::run(output.as_deref(), seed),
        Commands::Info => commands::info::run(&config),
    }
}
