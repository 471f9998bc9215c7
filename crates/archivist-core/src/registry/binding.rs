//! Archive bindings.

use std::fmt;

use crate::catalog::{AssociationKind, Dependent};

/// Which way rows flow through a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Live table into its archive.
    Forward,
    /// Archive table back into the live table.
    Restore,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Restore => write!(f, "restore"),
        }
    }
}

/// A dependent association mirrored onto the archive entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeDescriptor {
    /// Association name (shared by source and archive entity).
    pub association: String,
    /// Association shape.
    pub kind: AssociationKind,
    /// Dependent entity on the live side.
    pub target: String,
    /// Dependent's archive entity the mirrored association points at.
    pub archive_target: String,
    /// Foreign key column.
    pub foreign_key: String,
    /// Dependent behavior.
    pub dependent: Dependent,
}

/// How rows of one entity are moved into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveBinding {
    /// Source entity.
    pub source: String,
    /// Source table.
    pub source_table: String,
    /// Destination entity.
    pub destination: String,
    /// Destination table.
    pub destination_table: String,
    /// Flow direction.
    pub direction: Direction,
    /// Magic timestamp column on the destination.
    pub magic: String,
    /// Copy rows without deleting them from the source.
    pub copy: bool,
    /// Columns copied verbatim from source to destination.
    pub transferred: Vec<String>,
    /// Destination has the magic column, so moves stamp it.
    pub stamp_magic: bool,
    /// Source carries its own magic column (legacy soft-delete data).
    pub carries_magic: bool,
    /// Destination stamps `created_at`/`updated_at` itself.
    pub timestamps: bool,
    /// Destination DDL is kept in sync.
    pub migrate: bool,
    /// Base predicate ANDed into every move.
    pub conditions: Option<String>,
    /// Dependent associations rewired onto the destination entity.
    pub cascades: Vec<CascadeDescriptor>,
}

impl ArchiveBinding {
    /// Check if this binding archives (rather than restores).
    pub fn is_forward(&self) -> bool {
        self.direction == Direction::Forward
    }
}

impl fmt::Display for ArchiveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) -> {} ({}) [{}, magic={}]",
            self.source,
            self.source_table,
            self.destination,
            self.destination_table,
            self.direction,
            self.magic
        )
    }
}
