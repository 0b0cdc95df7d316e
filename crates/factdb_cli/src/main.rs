//! FactDB CLI
//!
//! Command-line tools for FactDB store maintenance.
//!
//! # Commands
//!
//! - `inspect` - Show basis, attributes and index sizes
//! - `dump` - Print datoms from one index
//! - `export` / `import` - Move a whole store through a chunked stream
//! - `compact` - Rewrite the journal from live state

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// FactDB command-line store tools.
#[derive(Parser)]
#[command(name = "factdb")]
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
    /// Show basis transaction, attributes and per-index key counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print datoms from an index
    Dump {
        /// Index family (eavt, aevt, avet, vaet, txlog)
        #[arg(short, long, default_value = "eavt")]
        index: String,

        /// Only this entity, as a raw id or `partition:counter`
        #[arg(short, long)]
        entity: Option<String>,

        /// Read the store as of this transaction counter
        #[arg(long, conflicts_with = "history")]
        as_of: Option<u64>,

        /// Include every assertion and retraction
        #[arg(long)]
        history: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Maximum number of datoms to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Write the whole store to an export file
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Replace the store with the contents of an export file
    Import {
        /// Input file
        input: PathBuf,
    },

    /// Rewrite the journal from live state
    Compact,

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
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Dump {
            index,
            entity,
            as_of,
            history,
            format,
            limit,
        } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            let options = commands::dump::DumpOptions {
                index,
                entity,
                as_of,
                history,
                limit,
            };
            commands::dump::run(&path, &options, &format)?;
        }
        Commands::Export { output } => {
            let path = cli.path.ok_or("Store path required for export")?;
            commands::export::run(&path, &output)?;
        }
        Commands::Import { input } => {
            let path = cli.path.ok_or("Store path required for import")?;
            commands::import::run(&path, &input)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::Version => {
            println!("FactDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Export format v{}", factdb_core::EXPORT_VERSION);
        }
    }

    Ok(())
}
