//! Manifest loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use archivist_core::{ArchiveConfig, Archivist, Catalog, EntityDef, SqliteStore};
use serde::Deserialize;

use crate::error::CliError;

/// Entities, their archive configuration, and the database they live in.
///
/// ```json
/// {
///   "database": "blog.db",
///   "entities": [
///     { "name": "Post", "table": "posts", "associations": [
///       { "name": "comments", "kind": "has_many", "target": "Comment",
///         "foreign_key": "post_id", "dependent": "destroy" }
///     ] },
///     { "name": "Comment", "table": "comments" }
///   ],
///   "archive": { "Post": [{}], "Comment": [{}] }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Database path, relative to the manifest.
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
    /// Same shape as `config/archive.json`.
    #[serde(default)]
    pub archive: Option<serde_json::Value>,
    #[serde(skip)]
    base: PathBuf,
}

impl Manifest {
    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&text).map_err(|source| CliError::Manifest {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    /// Open the database and register every configured binding.
    ///
    /// Bindings from the manifest apply first, then those from
    /// `<config_root>/config/archive.json`.
    pub fn open(
        &self,
        database: Option<&Path>,
        config_root: Option<&Path>,
    ) -> Result<Archivist<SqliteStore>, CliError> {
        let database = match (database, &self.database) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(path)) => self.base.join(path),
            (None, None) => return Err(CliError::MissingDatabase),
        };
        tracing::debug!(database = %database.display(), "opening database");

        let store = SqliteStore::open(&database)?;
        let catalog = Catalog::with_entities(self.entities.iter().cloned());
        let archivist = Archivist::new(store, Arc::new(catalog));

        if let Some(archive) = &self.archive {
            ArchiveConfig::from_value(archive.clone())?
                .apply(archivist.registry(), archivist.store());
        }
        if let Some(root) = config_root {
            if let Some(config) = ArchiveConfig::load(root, None)? {
                config.apply(archivist.registry(), archivist.store());
            }
        }
        Ok(archivist)
    }
}
