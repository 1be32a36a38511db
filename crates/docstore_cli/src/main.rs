//! Docstore CLI
//!
//! Maintenance tools that work on the raw files of a collection, without
//! knowing its entity type.
//!
//! # Commands
//!
//! - `inspect` - Display collection statistics
//! - `verify` - Cross-check the index against the data files
//! - `dump-index` - Print every index document
//! - `restore-backups` - Resolve backup siblings left in a storage root

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Docstore command-line collection tools.
#[derive(Parser)]
#[command(name = "docstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the collection directory
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
    /// Display collection statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cross-check the index against the data files
    Verify,

    /// Print every index document
    DumpIndex {
        /// Maximum number of documents to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Resolve backup siblings left by interrupted directory operations
    RestoreBackups {
        /// Storage root holding one directory per entity
        #[arg(long)]
        storage: PathBuf,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Collection path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Collection path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::DumpIndex { limit, format } => {
            let path = cli.path.ok_or("Collection path required for dump-index")?;
            commands::dump_index::run(&path, limit, &format)?;
        }
        Commands::RestoreBackups { storage } => {
            commands::restore_backups::run(&storage)?;
        }
        Commands::Version => {
            println!("docstore CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
