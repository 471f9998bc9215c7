//! Archivist Core - archive-on-delete for relational tables.
//!
//! Rows deleted from a bound table are relocated into a parallel archive
//! table instead of being destroyed. This crate provides the binding
//! registry, the schema projector, the delete interceptor, and the row
//! mover, together with a SQLite-backed [`Store`](store::Store).

pub mod archivist;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod intercept;
pub mod legacy;
pub mod mover;
pub mod predicate;
pub mod registry;
pub mod schema;
pub mod store;
pub mod value;

pub use archivist::Archivist;
pub use catalog::{AssociationDef, AssociationKind, Catalog, Dependent, EntityDef};
pub use config::{ApplyReport, ArchiveConfig, ConfigEntry, DEFAULT_CONFIG_FILE};
pub use error::{ConfigError, Error, ParseError, Result};
pub use guard::ArchiveGuard;
pub use intercept::{DeleteRequest, Interceptor};
pub use legacy::LegacyMigrationReport;
pub use mover::{MoveOptions, MovePlan, MoveReport, MoveRequest, RowMover};
pub use predicate::Predicate;
pub use registry::{
    ArchiveBinding, ArchiveOptions, ArchiveRegistry, CascadeDescriptor, Direction,
    SchemaSyncEntry, SyncReport,
};
pub use schema::{project, ColumnDef, ColumnType, Projection, ProjectionRules};
pub use store::{SqliteStore, Store, StoreError};
pub use value::Value;
