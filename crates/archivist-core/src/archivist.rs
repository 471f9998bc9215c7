//! Runtime API.
//!
//! [`Archivist`] wraps one store connection and routes every deletion
//! pathway through the interceptor:
//!
//! - raw statements ([`Archivist::execute`]) and structured requests
//!   ([`Archivist::delete`]) are archived before they delete;
//! - object destruction ([`Archivist::destroy`]) walks dependent
//!   associations and deletes each level through the same path, all inside
//!   one store transaction;
//! - the bulk primitives ([`Archivist::delete_all`], [`Archivist::destroy_all`])
//!   run with interception suspended and do not archive.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::catalog::{AssociationDef, AssociationKind, Catalog, Dependent, EntityDef};
use crate::error::{ConfigError, Error, Result};
use crate::guard::ArchiveGuard;
use crate::intercept::{DeleteRequest, Interceptor};
use crate::legacy::LegacyMigrationReport;
use crate::mover::{MoveOptions, MoveReport, MoveRequest, RowMover};
use crate::predicate::{quote_identifier, Predicate};
use crate::registry::{ArchiveBinding, ArchiveOptions, ArchiveRegistry, SyncReport};
use crate::store::Store;
use crate::value::Value;

/// Maximum depth of dependent-association cascades.
const MAX_CASCADE_DEPTH: usize = 100;

/// Source of the time stamped into magic columns.
pub type Clock = fn() -> DateTime<Utc>;

/// Archive-aware handle over one store connection.
pub struct Archivist<S: Store> {
    store: S,
    interceptor: Interceptor,
    guard: ArchiveGuard,
    clock: Clock,
}

impl<S: Store> Archivist<S> {
    /// Create an archivist with a fresh registry over `catalog`.
    pub fn new(store: S, catalog: Arc<Catalog>) -> Self {
        Self::with_registry(store, Arc::new(ArchiveRegistry::new(catalog)))
    }

    /// Create an archivist sharing an existing registry.
    pub fn with_registry(store: S, registry: Arc<ArchiveRegistry>) -> Self {
        Self {
            store,
            interceptor: Interceptor::new(registry),
            guard: ArchiveGuard::new(),
            clock: Utc::now,
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ArchiveRegistry> {
        self.interceptor.registry()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.registry().catalog()
    }

    pub fn guard(&self) -> &ArchiveGuard {
        &self.guard
    }

    /// Bind `entity` to an archive. See [`ArchiveRegistry::register`].
    pub fn register(&self, entity: &str, options: ArchiveOptions) -> Result<ArchiveBinding> {
        self.registry().register(&self.store, entity, options)
    }

    /// Bindings whose source is any of `entities`.
    pub fn find(&self, entities: &[&str]) -> Vec<ArchiveBinding> {
        self.registry().find(entities)
    }

    /// Bindings whose source table is any of `tables`.
    pub fn find_tables<T: AsRef<str>>(&self, tables: &[T]) -> Vec<ArchiveBinding> {
        self.registry().find_by_tables(tables)
    }

    /// Move the rows of `binding`'s source matching `predicate`.
    ///
    /// Runs with interception suspended.
    pub fn move_rows(
        &self,
        binding: &ArchiveBinding,
        predicate: Predicate,
        options: MoveOptions,
    ) -> Result<MoveReport> {
        let request = MoveRequest::new(binding, predicate).with_options(options);
        let now = self.now();
        self.guard
            .suspend(|| RowMover::run(&self.store, &request, now))
    }

    /// Execute a raw statement, archiving first if it is a `DELETE`.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.interceptor
            .execute(&self.store, sql, self.guard.is_engaged(), self.now())
    }

    /// Delete the rows `request` targets, archiving them first.
    pub fn delete(&self, request: &DeleteRequest) -> Result<usize> {
        self.delete_in(&self.store, request)
    }

    /// Copy the rows `request` targets into their archives without deleting
    /// them. Returns one report per binding whose source table is targeted.
    pub fn copy_to_archive(&self, request: &DeleteRequest) -> Result<Vec<MoveReport>> {
        self.interceptor
            .intercept(&self.store, request, self.guard.is_engaged(), self.now())
    }

    /// Destroy one row of `entity` by primary key, cascading to dependents.
    ///
    /// Returns the number of rows deleted across the whole cascade. The
    /// cascade runs in one transaction: if any level fails, nothing is
    /// deleted or archived.
    pub fn destroy(&self, entity: &str, id: impl Into<Value>) -> Result<usize> {
        let def = self.entity(entity)?;
        let predicate = Predicate::eq(&def.primary_key, id);
        self.store
            .transaction(|tx| self.destroy_where(tx, &def, predicate, 0))
    }

    /// Bulk delete without archiving and without cascading.
    pub fn delete_all(&self, entity: &str, predicate: Predicate) -> Result<usize> {
        let def = self.entity(entity)?;
        self.guard
            .suspend(|| self.delete(&DeleteRequest::new(&def.table, predicate)))
    }

    /// Bulk destroy without archiving; dependents are still cascaded.
    pub fn destroy_all(&self, entity: &str, predicate: Predicate) -> Result<usize> {
        let def = self.entity(entity)?;
        self.guard.suspend(|| {
            self.store
                .transaction(|tx| self.destroy_where(tx, &def, predicate, 0))
        })
    }

    /// Archive every row of `entity` matching `conditions`, one row at a
    /// time, cascading to dependents.
    pub fn archive_all(&self, entity: &str, conditions: Option<&str>) -> Result<usize> {
        if self.registry().forward_binding(entity).is_none() {
            return Err(Error::NotArchived(entity.to_string()));
        }
        let def = self.entity(entity)?;
        let ids = self.store.select_column(
            &def.table,
            &def.primary_key,
            &Predicate::from_conditions(conditions),
        )?;

        let mut archived = 0;
        for id in ids {
            let predicate = Predicate::eq(&def.primary_key, id);
            archived += self
                .store
                .transaction(|tx| self.destroy_where(tx, &def, predicate, 0))?;
        }
        tracing::info!(entity, archived, "archived rows");
        Ok(archived)
    }

    /// Move archived rows of `entity` matching `predicate` back into the
    /// live table, cascading through archived dependents.
    ///
    /// `entity` may name either the live entity or its archive entity.
    pub fn restore(&self, entity: &str, predicate: Predicate) -> Result<usize> {
        let archive = match self.registry().forward_binding(entity) {
            Some(binding) => binding.destination,
            None if self.registry().binding(entity).is_some() => entity.to_string(),
            None => return Err(Error::NotArchived(entity.to_string())),
        };
        let def = self.entity(&archive)?;
        let restored = self
            .store
            .transaction(|tx| self.destroy_where(tx, &def, predicate, 0))?;
        tracing::info!(entity = %archive, restored, "restored rows");
        Ok(restored)
    }

    /// Run `f` with interception suspended; deletes inside it are not archived.
    pub fn disable<T>(&self, f: impl FnOnce() -> T) -> T {
        self.guard.suspend(f)
    }

    /// Relocate rows soft-deleted under a flag-column convention into the
    /// archive, keeping their original deletion times.
    pub fn run_legacy_migration(&self, entity: &str) -> Result<LegacyMigrationReport> {
        let started = Instant::now();
        let mut moved = 0;

        for binding in self.find(&[entity]).iter().filter(|b| b.is_forward()) {
            if !binding.carries_magic {
                tracing::debug!(
                    entity,
                    column = %binding.magic,
                    "source has no magic column, skipping legacy migration"
                );
                continue;
            }
            let options = MoveOptions::new().with_copy(false).with_migrate(true);
            let report =
                self.move_rows(binding, Predicate::is_not_null(&binding.magic), options)?;
            moved += report.deleted;
        }

        let report = LegacyMigrationReport {
            entity: entity.to_string(),
            moved,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            entity,
            moved,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "migrated legacy soft-deleted rows"
        );
        Ok(report)
    }

    /// Bring archive tables up to date with their sources' columns.
    pub fn sync_schema(&self) -> Result<SyncReport> {
        self.registry().sync_schema(&self.store)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn entity(&self, name: &str) -> Result<EntityDef> {
        self.catalog()
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEntity(name.to_string()).into())
    }

    fn delete_in<T: Store + ?Sized>(&self, store: &T, request: &DeleteRequest) -> Result<usize> {
        self.interceptor
            .delete(store, request, self.guard.is_engaged(), self.now())
    }

    /// Delete the rows of `def` matching `predicate` and, first, their
    /// dependents. Owners reached through `belongs_to` are removed after the
    /// rows that reference them. Returns the rows deleted at every level.
    fn destroy_where(
        &self,
        store: &dyn Store,
        def: &EntityDef,
        predicate: Predicate,
        depth: usize,
    ) -> Result<usize> {
        if depth >= MAX_CASCADE_DEPTH {
            return Err(Error::CascadeDepthExceeded {
                entity: def.name.clone(),
                depth,
            });
        }

        let keys = format!(
            "SELECT {} FROM {}{}",
            quote_identifier(&def.primary_key),
            quote_identifier(&def.table),
            predicate.where_clause()
        );

        let mut deleted = 0;
        let mut owners: Vec<(&AssociationDef, Vec<Value>)> = Vec::new();
        for association in def.dependent_associations() {
            match association.kind {
                AssociationKind::HasMany | AssociationKind::HasOne => {
                    let scope = Predicate::raw(format!(
                        "{} IN ({})",
                        quote_identifier(&association.foreign_key),
                        keys
                    ));
                    deleted += self.destroy_dependents(store, association, scope, depth)?;
                }
                AssociationKind::BelongsTo => {
                    let ids = store
                        .select_column(&def.table, &association.foreign_key, &predicate)?
                        .into_iter()
                        .filter(|v| !v.is_null())
                        .collect();
                    owners.push((association, ids));
                }
            }
        }

        let own = self.delete_in(store, &DeleteRequest::new(&def.table, predicate))?;
        tracing::debug!(entity = %def.name, deleted = own, depth, "destroyed rows");
        deleted += own;

        for (association, ids) in owners {
            let target = self.entity(&association.target)?;
            let scope = Predicate::in_list(&target.primary_key, ids);
            deleted += self.destroy_dependents(store, association, scope, depth)?;
        }

        Ok(deleted)
    }

    fn destroy_dependents(
        &self,
        store: &dyn Store,
        association: &AssociationDef,
        scope: Predicate,
        depth: usize,
    ) -> Result<usize> {
        let target = self.entity(&association.target)?;
        match association.dependent {
            Some(Dependent::Destroy) if store.count(&target.table, &scope)? > 0 => {
                self.destroy_where(store, &target, scope, depth + 1)
            }
            Some(Dependent::DeleteAll) => {
                self.delete_in(store, &DeleteRequest::new(&target.table, scope))
            }
            _ => Ok(0),
        }
    }
}
