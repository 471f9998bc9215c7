//! Persistence layer seam.
//!
//! The archival engine never talks to a database directly; it issues SQL
//! text and schema requests through [`Store`]. [`SqliteStore`] is the
//! bundled implementation.

mod sqlite;

pub use sqlite::{SqliteStore, SqliteTransaction};

use thiserror::Error;

use crate::predicate::Predicate;
use crate::schema::ColumnDef;
use crate::value::Value;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A table the operation needs does not exist.
    #[error("table does not exist: {0}")]
    MissingTable(String),
}

/// A transactional relational store reachable through one connection.
pub trait Store {
    /// Check if a table exists.
    fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    /// Columns of a table, in declaration order. Empty if the table is missing.
    fn columns(&self, table: &str) -> Result<Vec<ColumnDef>, StoreError>;

    /// Create a table with the given columns.
    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<(), StoreError>;

    /// Add a nullable column to an existing table.
    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), StoreError>;

    /// Execute one statement, returning the number of affected rows.
    fn execute(&self, sql: &str) -> Result<usize, StoreError>;

    /// Execute statements in order inside one transaction.
    ///
    /// Either every statement takes effect or none does. Returns the
    /// affected row count of each statement.
    fn execute_atomic(&self, statements: &[String]) -> Result<Vec<usize>, StoreError>;

    /// Values of one column for the rows matching `predicate`.
    fn select_column(
        &self,
        table: &str,
        column: &str,
        predicate: &Predicate,
    ) -> Result<Vec<Value>, StoreError>;

    /// Number of rows matching `predicate`.
    fn count(&self, table: &str, predicate: &Predicate) -> Result<u64, StoreError>;

    /// Run `f` inside one transaction scope.
    ///
    /// Everything `f` does through the scoped store commits when it returns
    /// `Ok` and rolls back when it returns `Err`. Atomic batches issued
    /// inside the scope nest under it.
    fn transaction<T, E>(&self, f: impl FnOnce(&dyn Store) -> Result<T, E>) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>;
}
