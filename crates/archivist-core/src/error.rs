//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Archival errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Store (persistence layer) error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A deletion statement could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Copying or deleting rows during a move failed.
    #[error("failed to move rows from {source_table} to {destination_table}: {source}")]
    Move {
        /// Table rows were moved from.
        source_table: String,
        /// Table rows were moved into.
        destination_table: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The entity has no forward archive binding.
    #[error("entity {0} is not archived")]
    NotArchived(String),

    /// Dependent-association cascade nested too deeply.
    #[error("cascade depth exceeded ({depth}) while destroying {entity}")]
    CascadeDepthExceeded {
        /// Entity being destroyed when the limit was hit.
        entity: String,
        /// Depth reached.
        depth: usize,
    },
}

/// Configuration errors.
///
/// These are logged and skipped when applying a configuration file; they
/// only propagate from direct `register` calls.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top level of the configuration is not an object.
    #[error("configuration root must be an object keyed by entity name")]
    NotAnObject,

    /// An entry's value or one of its option sets is malformed.
    #[error("invalid entry for {entity}: {reason}")]
    InvalidEntry {
        /// Entity the entry belongs to.
        entity: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No entity with this name is defined in the catalog.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The entity's table does not exist in the store.
    #[error("table {table} for entity {entity} does not exist")]
    MissingTable {
        /// Entity being registered.
        entity: String,
        /// Table that was expected.
        table: String,
    },

    /// An archive-side registration did not name the entity it restores into.
    #[error("archive entity {0} must name its source class")]
    MissingClass(String),
}

/// Deletion statement parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Statement does not have the `DELETE FROM <tables> [WHERE <predicate>]` shape.
    #[error("not a DELETE FROM statement: {0}")]
    NotDelete(String),

    /// Statement names no tables.
    #[error("DELETE statement names no tables: {0}")]
    NoTables(String),

    /// Statement has a WHERE keyword with nothing after it.
    #[error("DELETE statement has an empty WHERE clause: {0}")]
    EmptyPredicate(String),
}
