//! Travelstore CLI
//!
//! Command-line tools for inspecting a Travelstore data directory.
//!
//! # Commands
//!
//! - `inspect` - Display per-table row counts and sync watermarks
//! - `conflicts` - List replication conflicts awaiting reconciliation
//! - `verify-pools` - Check the balance invariant of every pool row

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use travelstore_core::TableName;

use crate::error::CliError;

/// Travelstore command-line tools.
#[derive(Parser)]
#[command(name = "travelstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-table statistics and sync watermarks
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List replication conflicts
    Conflicts {
        /// Only show conflicts of this table
        #[arg(short, long)]
        table: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify that no pool balance is negative or above its initial amount
    VerifyPools,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(CliError::MissingPath("inspect"))?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Conflicts { table, format } => {
            let path = cli.path.ok_or(CliError::MissingPath("conflicts"))?;
            let table = table
                .map(|t| t.parse::<TableName>())
                .transpose()
                .map_err(CliError::UnknownTable)?;
            commands::conflicts::run(&path, table, &format)?;
        }
        Commands::VerifyPools => {
            let path = cli.path.ok_or(CliError::MissingPath("verify-pools"))?;
            commands::verify_pools::run(&path)?;
        }
        Commands::Version => {
            println!("Travelstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Travelstore Core v{}", travelstore_core::VERSION);
            println!("Travelstore Sync Engine v{}", travelstore_sync_engine::VERSION);
        }
    }

    Ok(())
}
