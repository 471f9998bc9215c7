//! Legacy soft-delete migration.
//!
//! Entities adopted from a flag-column soft-delete convention still hold
//! their deleted rows in the live table, marked by a non-null magic column.
//! A one-time migration relocates those rows into the archive, carrying the
//! original deletion timestamps over.

use std::fmt;
use std::time::Duration;

/// Outcome of a legacy migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMigrationReport {
    pub entity: String,
    /// Rows relocated into archive tables.
    pub moved: usize,
    /// Wall-clock time the run took.
    pub elapsed: Duration,
}

impl fmt::Display for LegacyMigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- {}.migrate_from_soft_delete", self.entity)?;
        write!(f, "   -> {:.4}s", self.elapsed.as_secs_f64())
    }
}
