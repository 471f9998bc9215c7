//! Binding registry.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::binding::{ArchiveBinding, Direction};
use super::cascade::CascadeResolver;
use super::options::{ArchiveOptions, DEFAULT_MAGIC_COLUMN, RESTORE_MAGIC_COLUMN};
use crate::catalog::{Catalog, EntityDef};
use crate::error::{ConfigError, Result};
use crate::schema::{project, ColumnDef, Projection, ProjectionRules};
use crate::store::Store;

/// A destination whose DDL follows its source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSyncEntry {
    /// Source entity.
    pub source: String,
    /// Source table.
    pub source_table: String,
    /// Destination table.
    pub destination_table: String,
    /// Projection applied to the source columns.
    pub rules: ProjectionRules,
}

/// Outcome of [`ArchiveRegistry::sync_schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Destination tables created.
    pub created: Vec<String>,
    /// `(table, column)` pairs added to existing destinations.
    pub added: Vec<(String, String)>,
}

impl SyncReport {
    /// Check if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.added.is_empty()
    }
}

/// Registry of archive bindings.
///
/// Written once per entity at setup, read on every interception.
pub struct ArchiveRegistry {
    catalog: Arc<Catalog>,
    bindings: RwLock<Vec<ArchiveBinding>>,
    sync_entries: RwLock<Vec<SchemaSyncEntry>>,
    setup: Mutex<()>,
}

impl ArchiveRegistry {
    /// Create an empty registry over `catalog`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            bindings: RwLock::new(Vec::new()),
            sync_entries: RwLock::new(Vec::new()),
            setup: Mutex::new(()),
        }
    }

    /// The entity catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Bind `entity` to an archive.
    ///
    /// Returns the existing binding unchanged if `entity` is already bound.
    /// Otherwise resolves (or synthesizes) the destination entity, creates
    /// the destination table if it is missing, binds the destination back
    /// to `entity` for restores, and wires cascades.
    pub fn register<S: Store + ?Sized>(
        &self,
        store: &S,
        entity: &str,
        options: ArchiveOptions,
    ) -> Result<ArchiveBinding> {
        let _setup = self.setup.lock();

        if let Some(existing) = self.binding(entity) {
            tracing::debug!(entity, "already bound, ignoring registration");
            return Ok(existing);
        }

        let def = self
            .catalog
            .get(entity)
            .ok_or_else(|| ConfigError::UnknownEntity(entity.to_string()))?;

        if options.archive {
            self.register_archive_side(store, &def, &options)
        } else {
            self.register_forward(store, &def, &options)
        }
    }

    fn register_forward<S: Store + ?Sized>(
        &self,
        store: &S,
        def: &EntityDef,
        options: &ArchiveOptions,
    ) -> Result<ArchiveBinding> {
        let magic = options.magic_column().to_string();
        let source_columns = table_columns(store, &def.name, &def.table)?;
        let rules = ProjectionRules::archive(&magic, RESTORE_MAGIC_COLUMN);
        let projection = project(&source_columns, &rules);

        let class = options
            .class
            .clone()
            .unwrap_or_else(|| format!("{}::Archive", def.name));
        let table = options
            .table
            .clone()
            .unwrap_or_else(|| format!("archived_{}", def.table));

        if !store.table_exists(&table)? {
            store.create_table(&table, &archive_columns(&projection.columns))?;
            tracing::info!(entity = %def.name, table = %table, "created archive table");
        }
        let destination_columns = store.columns(&table)?;

        if !self.catalog.set_table(&class, table.clone()) {
            self.catalog
                .define(EntityDef::new(&class, &table).with_primary_key(&def.primary_key));
        }

        let forward = ArchiveBinding {
            source: def.name.clone(),
            source_table: def.table.clone(),
            destination: class.clone(),
            destination_table: table.clone(),
            direction: Direction::Forward,
            magic: magic.clone(),
            copy: true,
            transferred: forward_columns(&projection, &destination_columns),
            stamp_magic: has_column(&destination_columns, &magic),
            carries_magic: has_column(&source_columns, &magic),
            timestamps: options.timestamps.unwrap_or(false),
            migrate: options.migrates(),
            conditions: options.conditions.clone(),
            cascades: Vec::new(),
        };

        let restore = match self.binding(&class) {
            Some(_) => None,
            None => Some(ArchiveBinding {
                source: class.clone(),
                source_table: table.clone(),
                destination: def.name.clone(),
                destination_table: def.table.clone(),
                direction: Direction::Restore,
                magic: RESTORE_MAGIC_COLUMN.to_string(),
                copy: true,
                transferred: restore_columns(
                    &destination_columns,
                    &source_columns,
                    &magic,
                    RESTORE_MAGIC_COLUMN,
                ),
                stamp_magic: has_column(&source_columns, RESTORE_MAGIC_COLUMN),
                carries_magic: has_column(&destination_columns, RESTORE_MAGIC_COLUMN),
                timestamps: false,
                migrate: false,
                conditions: None,
                cascades: Vec::new(),
            }),
        };

        let registered = {
            let mut bindings = self.bindings.write();
            bindings.push(forward);
            let index = bindings.len() - 1;
            if let Some(restore) = restore {
                bindings.push(restore);
            }

            let resolver = CascadeResolver::new(&self.catalog);
            let cascades = resolver.resolve(def, &bindings);
            resolver.wire(&class, &cascades);
            bindings[index].cascades = cascades;
            resolver.backfill(&mut bindings, &def.name);
            bindings[index].clone()
        };

        if registered.migrate {
            self.sync_entries.write().push(SchemaSyncEntry {
                source: def.name.clone(),
                source_table: def.table.clone(),
                destination_table: table.clone(),
                rules,
            });
        }

        tracing::info!(
            entity = %def.name,
            destination = %class,
            table = %table,
            magic = %magic,
            cascades = registered.cascades.len(),
            "registered archive binding"
        );
        Ok(registered)
    }

    /// Register an archive entity as restoring into the entity named by
    /// `options.class`.
    fn register_archive_side<S: Store + ?Sized>(
        &self,
        store: &S,
        def: &EntityDef,
        options: &ArchiveOptions,
    ) -> Result<ArchiveBinding> {
        let class = options
            .class
            .clone()
            .ok_or_else(|| ConfigError::MissingClass(def.name.clone()))?;
        let live = self
            .catalog
            .get(&class)
            .ok_or_else(|| ConfigError::UnknownEntity(class.clone()))?;

        let archive_columns = table_columns(store, &def.name, &def.table)?;
        let live_columns = table_columns(store, &live.name, &live.table)?;
        let forward_magic = self
            .forward_binding(&class)
            .map(|b| b.magic)
            .unwrap_or_else(|| DEFAULT_MAGIC_COLUMN.to_string());
        let magic = options
            .magic
            .clone()
            .unwrap_or_else(|| RESTORE_MAGIC_COLUMN.to_string());

        let binding = ArchiveBinding {
            source: def.name.clone(),
            source_table: def.table.clone(),
            destination: live.name.clone(),
            destination_table: live.table.clone(),
            direction: Direction::Restore,
            transferred: restore_columns(&archive_columns, &live_columns, &forward_magic, &magic),
            stamp_magic: has_column(&live_columns, &magic),
            carries_magic: has_column(&archive_columns, &magic),
            magic,
            copy: true,
            timestamps: options.timestamps.unwrap_or(false),
            migrate: false,
            conditions: options.conditions.clone(),
            cascades: Vec::new(),
        };

        self.bindings.write().push(binding.clone());
        tracing::info!(entity = %def.name, destination = %class, "registered restore binding");
        Ok(binding)
    }

    /// Bindings whose source is any of `entities`.
    pub fn find(&self, entities: &[&str]) -> Vec<ArchiveBinding> {
        self.bindings
            .read()
            .iter()
            .filter(|b| entities.contains(&b.source.as_str()))
            .cloned()
            .collect()
    }

    /// Bindings whose source table is any of `tables`.
    pub fn find_by_tables<T: AsRef<str>>(&self, tables: &[T]) -> Vec<ArchiveBinding> {
        self.bindings
            .read()
            .iter()
            .filter(|b| {
                tables
                    .iter()
                    .any(|t| t.as_ref().eq_ignore_ascii_case(&b.source_table))
            })
            .cloned()
            .collect()
    }

    /// The binding whose source is `entity`, in either direction.
    pub fn binding(&self, entity: &str) -> Option<ArchiveBinding> {
        self.bindings
            .read()
            .iter()
            .find(|b| b.source == entity)
            .cloned()
    }

    /// The forward binding whose source is `entity`.
    pub fn forward_binding(&self, entity: &str) -> Option<ArchiveBinding> {
        self.bindings
            .read()
            .iter()
            .find(|b| b.is_forward() && b.source == entity)
            .cloned()
    }

    /// Every binding, in registration order.
    pub fn bindings(&self) -> Vec<ArchiveBinding> {
        self.bindings.read().clone()
    }

    /// Destinations registered for DDL sync.
    pub fn sync_entries(&self) -> Vec<SchemaSyncEntry> {
        self.sync_entries.read().clone()
    }

    /// Bring destination tables up to date with their sources.
    ///
    /// Creates missing destinations and adds columns the source projection
    /// has gained. Never drops or retypes columns.
    pub fn sync_schema<S: Store + ?Sized>(&self, store: &S) -> Result<SyncReport> {
        let _setup = self.setup.lock();
        let mut report = SyncReport::default();

        for entry in self.sync_entries() {
            let source_columns = store.columns(&entry.source_table)?;
            if source_columns.is_empty() {
                tracing::warn!(
                    entity = %entry.source,
                    table = %entry.source_table,
                    "source table missing, skipping schema sync"
                );
                continue;
            }
            let projection = project(&source_columns, &entry.rules);

            if store.table_exists(&entry.destination_table)? {
                let existing = store.columns(&entry.destination_table)?;
                for column in archive_columns(&projection.columns)
                    .into_iter()
                    .filter(|c| !has_column(&existing, &c.name))
                {
                    store.add_column(&entry.destination_table, &column)?;
                    report
                        .added
                        .push((entry.destination_table.clone(), column.name));
                }
            } else {
                store.create_table(
                    &entry.destination_table,
                    &archive_columns(&projection.columns),
                )?;
                report.created.push(entry.destination_table.clone());
            }

            let destination_columns = store.columns(&entry.destination_table)?;
            self.refresh_columns(&entry, &projection, &source_columns, &destination_columns);
        }

        if !report.is_empty() {
            tracing::info!(
                created = report.created.len(),
                added = report.added.len(),
                "synchronized archive schema"
            );
        }
        Ok(report)
    }

    fn refresh_columns(
        &self,
        entry: &SchemaSyncEntry,
        projection: &Projection,
        source_columns: &[ColumnDef],
        destination_columns: &[ColumnDef],
    ) {
        let mut bindings = self.bindings.write();
        let Some(forward) = bindings
            .iter_mut()
            .find(|b| b.is_forward() && b.source == entry.source)
        else {
            return;
        };
        forward.transferred = forward_columns(projection, destination_columns);
        forward.stamp_magic = has_column(destination_columns, &forward.magic);
        forward.carries_magic = has_column(source_columns, &forward.magic);
        let (archive, forward_magic) = (forward.destination.clone(), forward.magic.clone());

        if let Some(restore) = bindings
            .iter_mut()
            .find(|b| !b.is_forward() && b.source == archive)
        {
            restore.transferred = restore_columns(
                destination_columns,
                source_columns,
                &forward_magic,
                &restore.magic,
            );
            restore.stamp_magic = has_column(source_columns, &restore.magic);
            restore.carries_magic = has_column(destination_columns, &restore.magic);
        }
    }
}

fn table_columns<S: Store + ?Sized>(
    store: &S,
    entity: &str,
    table: &str,
) -> Result<Vec<ColumnDef>> {
    let columns = store.columns(table)?;
    if columns.is_empty() {
        return Err(ConfigError::MissingTable {
            entity: entity.to_string(),
            table: table.to_string(),
        }
        .into());
    }
    Ok(columns)
}

/// Archive tables keep every version of a row, so they carry no key constraint.
fn archive_columns(columns: &[ColumnDef]) -> Vec<ColumnDef> {
    columns
        .iter()
        .map(|c| ColumnDef {
            primary_key: false,
            ..c.clone()
        })
        .collect()
}

fn has_column(columns: &[ColumnDef], name: &str) -> bool {
    columns.iter().any(|c| c.name == name)
}

/// Projected source columns that the destination actually has.
fn forward_columns(projection: &Projection, destination: &[ColumnDef]) -> Vec<String> {
    projection
        .transferred
        .iter()
        .filter(|c| has_column(destination, c))
        .cloned()
        .collect()
}

/// Archive columns copied back on restore: shared with the live table,
/// minus both magic columns.
fn restore_columns(
    archive: &[ColumnDef],
    live: &[ColumnDef],
    forward_magic: &str,
    restore_magic: &str,
) -> Vec<String> {
    archive
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| *name != forward_magic && *name != restore_magic)
        .filter(|name| has_column(live, name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssociationDef, Dependent};
    use crate::predicate::Predicate;
    use crate::store::SqliteStore;
    use pretty_assertions::assert_eq;

    fn setup() -> (SqliteStore, ArchiveRegistry) {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                r#"
            CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, author_id INTEGER);
            CREATE TABLE comments (id INTEGER PRIMARY KEY, body TEXT, post_id INTEGER);
            "#,
            )
            .unwrap();
        let catalog = Catalog::with_entities([
            EntityDef::new("Post", "posts").with_association(
                AssociationDef::has_many("comments", "Comment", "post_id")
                    .with_dependent(Dependent::Destroy),
            ),
            EntityDef::new("Comment", "comments"),
        ]);
        (store, ArchiveRegistry::new(Arc::new(catalog)))
    }

    #[test]
    fn test_register_defaults() {
        let (store, registry) = setup();
        let binding = registry
            .register(&store, "Post", ArchiveOptions::new())
            .unwrap();

        assert_eq!(binding.destination, "Post::Archive");
        assert_eq!(binding.destination_table, "archived_posts");
        assert_eq!(binding.magic, "deleted_at");
        assert!(binding.copy);
        assert!(binding.stamp_magic);
        assert!(!binding.carries_magic);
        assert_eq!(binding.transferred, vec!["id", "title", "author_id"]);

        let archive_columns: Vec<String> = store
            .columns("archived_posts")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(archive_columns, vec!["id", "title", "author_id", "deleted_at"]);
        assert_eq!(
            registry.catalog().get("Post::Archive").unwrap().table,
            "archived_posts"
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let (store, registry) = setup();
        registry.register(&store, "Post", ArchiveOptions::new()).unwrap();
        let again = registry
            .register(&store, "Post", ArchiveOptions::new().with_magic("gone_at"))
            .unwrap();

        assert_eq!(again.magic, "deleted_at");
        assert_eq!(registry.find(&["Post"]).len(), 1);
        assert_eq!(registry.bindings().len(), 2);
        assert_eq!(registry.sync_entries().len(), 1);
    }

    #[test]
    fn test_archive_table_has_no_primary_key() {
        let (store, registry) = setup();
        registry.register(&store, "Post", ArchiveOptions::new()).unwrap();

        let columns = store.columns("archived_posts").unwrap();
        assert!(columns.iter().all(|c| !c.primary_key));

        let insert = "INSERT INTO archived_posts (id, title, author_id) VALUES (1, 'a', 5)";
        store.execute(insert).unwrap();
        store.execute(insert).unwrap();
        assert_eq!(store.count("archived_posts", &Predicate::All).unwrap(), 2);
    }

    #[test]
    fn test_find_by_tables_ignores_case() {
        let (store, registry) = setup();
        registry.register(&store, "Post", ArchiveOptions::new()).unwrap();

        let found = registry.find_by_tables(&["POSTS"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, "Post");
        assert_eq!(registry.find_by_tables(&["Archived_Posts"]).len(), 1);
        assert!(registry.find_by_tables(&["comments"]).is_empty());
    }

    #[test]
    fn test_restore_binding_is_registered() {
        let (store, registry) = setup();
        registry.register(&store, "Post", ArchiveOptions::new()).unwrap();

        let restore = registry.binding("Post::Archive").unwrap();
        assert_eq!(restore.direction, Direction::Restore);
        assert_eq!(restore.destination_table, "posts");
        assert_eq!(restore.magic, "restored_at");
        assert!(restore.copy);
        assert!(!restore.stamp_magic);
        assert_eq!(restore.transferred, vec!["id", "title", "author_id"]);
        assert_eq!(registry.find_by_tables(&["archived_posts"]).len(), 1);
    }

    #[test]
    fn test_custom_destination_and_no_migrate() {
        let (store, registry) = setup();
        let binding = registry
            .register(
                &store,
                "Post",
                ArchiveOptions::new()
                    .with_class("PostHistory")
                    .with_table("post_history")
                    .with_magic("removed_at")
                    .with_migrate(false),
            )
            .unwrap();

        assert_eq!(binding.destination, "PostHistory");
        assert!(store.table_exists("post_history").unwrap());
        assert!(registry.sync_entries().is_empty());
        assert!(store
            .columns("post_history")
            .unwrap()
            .iter()
            .any(|c| c.name == "removed_at"));
    }

    #[test]
    fn test_unknown_entity_and_missing_table() {
        let (store, registry) = setup();
        let err = registry
            .register(&store, "Ghost", ArchiveOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::UnknownEntity(_))
        ));

        registry.catalog().define(EntityDef::new("Tag", "tags"));
        let err = registry
            .register(&store, "Tag", ArchiveOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::MissingTable { .. })
        ));
        assert!(registry.find(&["Tag"]).is_empty());
    }

    #[test]
    fn test_cascade_wired_when_child_registered_first() {
        let (store, registry) = setup();
        registry.register(&store, "Comment", ArchiveOptions::new()).unwrap();
        let post = registry.register(&store, "Post", ArchiveOptions::new()).unwrap();

        assert_eq!(post.cascades.len(), 1);
        assert_eq!(post.cascades[0].archive_target, "Comment::Archive");
        let archive = registry.catalog().get("Post::Archive").unwrap();
        let mirrored = archive.association("comments").unwrap();
        assert_eq!(mirrored.target, "Comment::Archive");
        assert_eq!(mirrored.foreign_key, "post_id");
    }

    #[test]
    fn test_cascade_backfilled_when_child_registered_later() {
        let (store, registry) = setup();
        registry.register(&store, "Post", ArchiveOptions::new()).unwrap();
        assert!(registry.forward_binding("Post").unwrap().cascades.is_empty());

        registry.register(&store, "Comment", ArchiveOptions::new()).unwrap();

        let post = registry.forward_binding("Post").unwrap();
        assert_eq!(post.cascades.len(), 1);
        assert!(registry
            .catalog()
            .get("Post::Archive")
            .unwrap()
            .association("comments")
            .is_some());
    }

    #[test]
    fn test_sync_schema_adds_new_source_columns() {
        let (store, registry) = setup();
        registry.register(&store, "Post", ArchiveOptions::new()).unwrap();
        store
            .execute_batch("ALTER TABLE posts ADD COLUMN slug TEXT;")
            .unwrap();

        let report = registry.sync_schema(&store).unwrap();
        assert_eq!(
            report.added,
            vec![("archived_posts".to_string(), "slug".to_string())]
        );
        assert!(registry
            .forward_binding("Post")
            .unwrap()
            .transferred
            .contains(&"slug".to_string()));
        assert!(registry
            .binding("Post::Archive")
            .unwrap()
            .transferred
            .contains(&"slug".to_string()));

        assert!(registry.sync_schema(&store).unwrap().is_empty());
    }

    #[test]
    fn test_archive_side_registration_requires_class() {
        let (store, registry) = setup();
        store
            .execute_batch("CREATE TABLE old_posts (id INTEGER, title TEXT, deleted_at DATETIME);")
            .unwrap();
        registry
            .catalog()
            .define(EntityDef::new("OldPost", "old_posts"));

        let err = registry
            .register(
                &store,
                "OldPost",
                ArchiveOptions {
                    archive: true,
                    ..ArchiveOptions::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, crate::Error::Config(ConfigError::MissingClass(_))));

        let binding = registry
            .register(&store, "OldPost", ArchiveOptions::archive_of("Post"))
            .unwrap();
        assert_eq!(binding.direction, Direction::Restore);
        assert_eq!(binding.transferred, vec!["id", "title"]);
    }
}
