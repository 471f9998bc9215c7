//! SQLite store backed by rusqlite.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};

use super::{Store, StoreError};
use crate::predicate::{quote_identifier, Predicate};
use crate::schema::{ColumnDef, ColumnType};
use crate::value::Value;

const SAVEPOINT: &str = "archivist_atomic";

/// A [`Store`] over a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a batch of semicolon-separated statements (schema setup, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Borrow the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn.lock())
    }
}

impl Store for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        table_exists(&self.conn.lock(), table)
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnDef>, StoreError> {
        columns(&self.conn.lock(), table)
    }

    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<(), StoreError> {
        create_table(&self.conn.lock(), table, columns)
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), StoreError> {
        add_column(&self.conn.lock(), table, column)
    }

    fn execute(&self, sql: &str) -> Result<usize, StoreError> {
        Ok(self.conn.lock().execute(sql, [])?)
    }

    fn execute_atomic(&self, statements: &[String]) -> Result<Vec<usize>, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let counts = execute_all(&tx, statements)?;
        tx.commit()?;
        Ok(counts)
    }

    fn select_column(
        &self,
        table: &str,
        column: &str,
        predicate: &Predicate,
    ) -> Result<Vec<Value>, StoreError> {
        select_column(&self.conn.lock(), table, column, predicate)
    }

    fn count(&self, table: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        count(&self.conn.lock(), table, predicate)
    }

    fn transaction<T, E>(&self, f: impl FnOnce(&dyn Store) -> Result<T, E>) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let value = f(&SqliteTransaction { conn: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// A [`Store`] scoped to an open transaction of a [`SqliteStore`].
///
/// Atomic batches and nested transactions run under savepoints, so a failure
/// inside them rolls back only their own statements.
pub struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl SqliteTransaction<'_> {
    fn savepoint<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))
            .map_err(StoreError::from)?;
        match f() {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {SAVEPOINT}"))
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"))
                {
                    tracing::warn!(error = %rollback, "failed to roll back savepoint");
                }
                Err(err)
            }
        }
    }
}

impl Store for SqliteTransaction<'_> {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        table_exists(self.conn, table)
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnDef>, StoreError> {
        columns(self.conn, table)
    }

    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<(), StoreError> {
        create_table(self.conn, table, columns)
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), StoreError> {
        add_column(self.conn, table, column)
    }

    fn execute(&self, sql: &str) -> Result<usize, StoreError> {
        Ok(self.conn.execute(sql, [])?)
    }

    fn execute_atomic(&self, statements: &[String]) -> Result<Vec<usize>, StoreError> {
        self.savepoint(|| execute_all(self.conn, statements))
    }

    fn select_column(
        &self,
        table: &str,
        column: &str,
        predicate: &Predicate,
    ) -> Result<Vec<Value>, StoreError> {
        select_column(self.conn, table, column, predicate)
    }

    fn count(&self, table: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        count(self.conn, table, predicate)
    }

    fn transaction<T, E>(&self, f: impl FnOnce(&dyn Store) -> Result<T, E>) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
    {
        self.savepoint(|| f(self))
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn columns(conn: &Connection, table: &str) -> Result<Vec<ColumnDef>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let declared: String = row.get(2)?;
            let pk: i64 = row.get(5)?;
            Ok(ColumnDef {
                name,
                column_type: ColumnType::from_declared(&declared),
                primary_key: pk > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn create_table(conn: &Connection, table: &str, columns: &[ColumnDef]) -> Result<(), StoreError> {
    let mut defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.column_type.sql_name()))
        .collect();
    let keys: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_identifier(&c.name))
        .collect();
    if !keys.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    let sql = format!("CREATE TABLE {} ({})", quote_identifier(table), defs.join(", "));
    tracing::debug!(table, sql = %sql, "creating table");
    conn.execute(&sql, [])?;
    Ok(())
}

fn add_column(conn: &Connection, table: &str, column: &ColumnDef) -> Result<(), StoreError> {
    if !table_exists(conn, table)? {
        return Err(StoreError::MissingTable(table.to_string()));
    }
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_identifier(table),
        quote_identifier(&column.name),
        column.column_type.sql_name()
    );
    tracing::debug!(table, column = %column.name, "adding column");
    conn.execute(&sql, [])?;
    Ok(())
}

fn execute_all(conn: &Connection, statements: &[String]) -> Result<Vec<usize>, StoreError> {
    statements
        .iter()
        .map(|sql| conn.execute(sql, []).map_err(StoreError::from))
        .collect()
}

fn select_column(
    conn: &Connection,
    table: &str,
    column: &str,
    predicate: &Predicate,
) -> Result<Vec<Value>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {}{}",
        quote_identifier(column),
        quote_identifier(table),
        predicate.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map([], |row| Ok(value_from_ref(row.get_ref(0)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

fn count(conn: &Connection, table: &str, predicate: &Predicate) -> Result<u64, StoreError> {
    let sql = format!(
        "SELECT count(*) FROM {}{}",
        quote_identifier(table),
        predicate.where_clause()
    );
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
    }
}
