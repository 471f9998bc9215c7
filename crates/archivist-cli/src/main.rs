//! Archivist Command-Line Client
//!
//! Loads a manifest describing entities and their archive configuration,
//! opens the SQLite database it names, and runs one archival operation.

mod commands;
mod error;
mod formatter;
mod manifest;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;

/// Archivist Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "archivist")]
#[command(version, about = "Archive-on-delete for SQLite tables")]
pub struct Args {
    /// Manifest file (entities plus archive configuration)
    #[arg(short = 'm', long, default_value = "archivist.json")]
    pub manifest: PathBuf,

    /// Database file, overriding the manifest's
    #[arg(short = 'd', long)]
    pub database: Option<PathBuf>,

    /// Application root holding config/archive.json
    #[arg(long)]
    pub config_root: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List registered bindings
    Bindings,
    /// Execute a statement; DELETE statements are archived first
    Exec {
        /// SQL statement
        sql: String,
    },
    /// Destroy one row by primary key, cascading to dependents
    Destroy {
        /// Entity name
        entity: String,
        /// Primary key value
        id: String,
    },
    /// Copy rows into the archive without deleting them
    Copy {
        /// Entity name
        entity: String,
        /// Filter on live rows; all rows if omitted
        #[arg(long = "where")]
        filter: Option<String>,
    },
    /// Move archived rows back into the live table
    Restore {
        /// Entity name (live or archive)
        entity: String,
        /// Filter on archive rows; all rows if omitted
        #[arg(long = "where")]
        filter: Option<String>,
    },
    /// Archive every row matching the conditions, row by row
    ArchiveAll {
        /// Entity name
        entity: String,
        /// Filter on live rows; all rows if omitted
        #[arg(long)]
        conditions: Option<String>,
    },
    /// Move rows soft-deleted under a flag column into the archive
    MigrateLegacy {
        /// Entity names; every bound entity if omitted
        entities: Vec<String>,
    },
    /// Add source columns missing from archive tables
    SyncSchema,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("archivist=info,archivist_core=info")
            }),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<String, error::CliError> {
    let manifest = manifest::Manifest::load(&args.manifest)?;
    let archivist = manifest.open(args.database.as_deref(), args.config_root.as_deref())?;
    let formatter = formatter::create_formatter(args.format);

    commands::run(&archivist, args.command, &*formatter)
}
