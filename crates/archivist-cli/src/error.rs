//! CLI errors.

use std::path::PathBuf;

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Manifest could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid.
    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Neither the manifest nor the command line names a database.
    #[error("no database given (set \"database\" in the manifest or pass --database)")]
    MissingDatabase,

    /// Archival operation failed.
    #[error(transparent)]
    Archive(#[from] archivist_core::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] archivist_core::ConfigError),

    /// Database could not be opened.
    #[error("store error: {0}")]
    Store(#[from] archivist_core::StoreError),
}
