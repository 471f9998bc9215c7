//! Delete interceptor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::statement::DeleteRequest;
use crate::error::{Error, Result};
use crate::mover::{MoveOptions, MovePlan, MoveReport, MoveRequest, RowMover};
use crate::registry::ArchiveRegistry;
use crate::store::Store;

/// Archives rows ahead of every deletion that targets a bound table.
pub struct Interceptor {
    registry: Arc<ArchiveRegistry>,
    statement_lock: Mutex<()>,
}

impl Interceptor {
    pub fn new(registry: Arc<ArchiveRegistry>) -> Self {
        Self {
            registry,
            statement_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<ArchiveRegistry> {
        &self.registry
    }

    /// Copy plans for the rows `request` is about to delete, one per
    /// binding whose source table it targets.
    ///
    /// Plans never delete; the deletion itself removes the source rows.
    pub fn plan(&self, request: &DeleteRequest, now: DateTime<Utc>) -> Vec<MovePlan> {
        self.registry
            .find_by_tables(&request.tables)
            .iter()
            .map(|binding| {
                let move_request = MoveRequest::new(binding, request.predicate.clone())
                    .with_options(MoveOptions::new().with_copy(true));
                RowMover::plan(&move_request, now)
            })
            .collect()
    }

    /// Copy the rows `request` targets into their archives, leaving the
    /// deletion to the caller.
    pub fn intercept<S: Store + ?Sized>(
        &self,
        store: &S,
        request: &DeleteRequest,
        suppressed: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<MoveReport>> {
        if suppressed {
            tracing::debug!(tables = ?request.tables, "archival suppressed, skipping");
            return Ok(Vec::new());
        }
        let bindings = {
            let _statement = self.statement_lock.lock();
            self.registry.find_by_tables(&request.tables)
        };

        bindings
            .iter()
            .map(|binding| {
                let move_request = MoveRequest::new(binding, request.predicate.clone())
                    .with_options(MoveOptions::new().with_copy(true));
                RowMover::run(store, &move_request, now)
            })
            .collect()
    }

    /// Archive then delete the rows `request` targets, in one transaction.
    pub fn delete<S: Store + ?Sized>(
        &self,
        store: &S,
        request: &DeleteRequest,
        suppressed: bool,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.archive_and_delete(store, request, request.statements(), suppressed, now)
    }

    /// Execute a raw statement.
    ///
    /// `DELETE` statements are parsed and archived before the unmodified
    /// statement runs; a `DELETE` that cannot be parsed is an error. Any
    /// other statement passes straight through.
    pub fn execute<S: Store + ?Sized>(
        &self,
        store: &S,
        sql: &str,
        suppressed: bool,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if !DeleteRequest::is_delete(sql) {
            return Ok(store.execute(sql)?);
        }
        let request = DeleteRequest::parse(sql)?;
        self.archive_and_delete(store, &request, vec![sql.to_string()], suppressed, now)
    }

    fn archive_and_delete<S: Store + ?Sized>(
        &self,
        store: &S,
        request: &DeleteRequest,
        deletes: Vec<String>,
        suppressed: bool,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if suppressed {
            tracing::debug!(tables = ?request.tables, "archival suppressed, deleting directly");
            let counts = store.execute_atomic(&deletes)?;
            return Ok(counts.iter().sum());
        }
        // Only planning is serialized; the store may already be held by an
        // enclosing transaction.
        let (bindings, copies) = {
            let _statement = self.statement_lock.lock();
            let bindings = self.registry.find_by_tables(&request.tables);
            let copies: Vec<String> = self
                .plan(request, now)
                .into_iter()
                .map(|plan| plan.insert)
                .collect();
            (bindings, copies)
        };
        if bindings.is_empty() {
            let counts = store.execute_atomic(&deletes)?;
            return Ok(counts.iter().sum());
        }

        let copy_count = copies.len();
        let statements: Vec<String> = copies.into_iter().chain(deletes).collect();

        let counts = store
            .execute_atomic(&statements)
            .map_err(|source| Error::Move {
                source_table: request.tables.join(", "),
                destination_table: bindings
                    .iter()
                    .map(|b| b.destination_table.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                source,
            })?;

        let copied: usize = counts[..copy_count].iter().sum();
        let deleted: usize = counts[copy_count..].iter().sum();
        tracing::debug!(
            tables = ?request.tables,
            bindings = bindings.len(),
            copied,
            deleted,
            "archived rows ahead of delete"
        );
        Ok(deleted)
    }
}
