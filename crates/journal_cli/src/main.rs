//! Journal CLI
//!
//! Command-line tools for segmented journal directories. All commands take
//! the journal's directory lock, so they refuse to run against a journal
//! that a node has open. None of them modify the journal.
//!
//! # Commands
//!
//! - `inspect` - Display segments and the flushed index
//! - `verify` - Check every frame and report what recovery would do
//! - `dump` - Print records for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Segmented journal command-line tools.
#[derive(Parser)]
#[command(name = "journal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// File name prefix of the journal
    #[arg(global = true, short, long, default_value = "journal")]
    name: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segments and the flushed index
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify every segment and frame
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump records for debugging
    Dump {
        /// First index to dump
        #[arg(short, long)]
        from: Option<u64>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Journal path required for inspect")?;
            commands::inspect::run(&path, &cli.name, &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or("Journal path required for verify")?;
            commands::verify::run(&path, &cli.name, &format)?;
        }
        Commands::Dump {
            from,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Journal path required for dump")?;
            commands::dump::run(&path, &cli.name, from, limit, &format)?;
        }
        Commands::Version => {
            println!("journal v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
