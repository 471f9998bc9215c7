//! Registration options.

use serde::{Deserialize, Serialize};

/// Default magic column for archived rows.
pub const DEFAULT_MAGIC_COLUMN: &str = "deleted_at";

/// Magic column for restored rows.
pub const RESTORE_MAGIC_COLUMN: &str = "restored_at";

/// Options accepted by [`ArchiveRegistry::register`](super::ArchiveRegistry::register).
///
/// Every field is optional so that option sets from a configuration file
/// can be layered with [`ArchiveOptions::merged`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveOptions {
    /// The entity being registered is itself an archive.
    #[serde(default)]
    pub archive: bool,
    /// Magic column name override.
    pub magic: Option<String>,
    /// Destination entity name override.
    pub class: Option<String>,
    /// Destination table name override.
    pub table: Option<String>,
    /// Keep destination DDL in sync (default true).
    pub migrate: Option<bool>,
    /// Destination tracks its own create/update timestamps (default false).
    pub timestamps: Option<bool>,
    /// Extra predicate merged into every move for this binding.
    pub conditions: Option<String>,
}

impl ArchiveOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for an archive entity restoring into `class`.
    pub fn archive_of(class: impl Into<String>) -> Self {
        Self {
            archive: true,
            class: Some(class.into()),
            ..Self::default()
        }
    }

    /// Set the magic column.
    pub fn with_magic(mut self, magic: impl Into<String>) -> Self {
        self.magic = Some(magic.into());
        self
    }

    /// Set the destination entity name.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Set the destination table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Enable or disable destination DDL sync.
    pub fn with_migrate(mut self, migrate: bool) -> Self {
        self.migrate = Some(migrate);
        self
    }

    /// Enable or disable destination timestamp tracking.
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    /// Set the base predicate.
    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    /// Layer `overrides` on top of these options; set fields in `overrides` win.
    pub fn merged(&self, overrides: &ArchiveOptions) -> ArchiveOptions {
        ArchiveOptions {
            archive: self.archive || overrides.archive,
            magic: overrides.magic.clone().or_else(|| self.magic.clone()),
            class: overrides.class.clone().or_else(|| self.class.clone()),
            table: overrides.table.clone().or_else(|| self.table.clone()),
            migrate: overrides.migrate.or(self.migrate),
            timestamps: overrides.timestamps.or(self.timestamps),
            conditions: overrides
                .conditions
                .clone()
                .or_else(|| self.conditions.clone()),
        }
    }

    /// Effective magic column for a forward (archiving) binding.
    pub fn magic_column(&self) -> &str {
        self.magic.as_deref().unwrap_or(DEFAULT_MAGIC_COLUMN)
    }

    /// Whether destination DDL sync is enabled.
    pub fn migrates(&self) -> bool {
        self.migrate != Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ArchiveOptions::new();
        assert_eq!(options.magic_column(), "deleted_at");
        assert!(options.migrates());
        assert!(!options.archive);
    }

    #[test]
    fn test_merged_prefers_overrides() {
        let shared = ArchiveOptions::new()
            .with_magic("removed_at")
            .with_conditions("tenant_id = 1");
        let item = ArchiveOptions::new()
            .with_table("post_history")
            .with_conditions("tenant_id = 2");

        let merged = shared.merged(&item);
        assert_eq!(merged.magic.as_deref(), Some("removed_at"));
        assert_eq!(merged.table.as_deref(), Some("post_history"));
        assert_eq!(merged.conditions.as_deref(), Some("tenant_id = 2"));
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys() {
        let ok: ArchiveOptions =
            serde_json::from_str(r#"{"magic":"gone_at","migrate":false}"#).unwrap();
        assert_eq!(ok.magic_column(), "gone_at");
        assert!(!ok.migrates());

        let err = serde_json::from_str::<ArchiveOptions>(r#"{"magik":"x"}"#);
        assert!(err.is_err());
    }
}
