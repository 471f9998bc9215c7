//! Archive configuration file.
//!
//! A JSON object keyed by entity name. Each value is an array of option
//! sets, one registration per set. When the last element lacks either a
//! `class` or a `table` key it holds options shared by the other elements:
//!
//! ```json
//! {
//!   "Post": [
//!     { "class": "PostArchive", "table": "post_archive" },
//!     { "magic": "removed_at" }
//!   ],
//!   "Comment": [{ "timestamps": true }]
//! }
//! ```
//!
//! Malformed entries are logged and skipped; the rest still apply.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::error::{ConfigError, Error};
use crate::registry::{ArchiveBinding, ArchiveOptions, ArchiveRegistry};
use crate::store::Store;

/// File name looked up under `<root>/config/`.
pub const DEFAULT_CONFIG_FILE: &str = "archive.json";

/// One registration requested by the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub entity: String,
    pub options: ArchiveOptions,
}

/// A parsed configuration file.
#[derive(Debug, Default)]
pub struct ArchiveConfig {
    /// Registrations, in file order per entity.
    pub entries: Vec<ConfigEntry>,
    /// Entries that could not be parsed.
    pub skipped: Vec<ConfigError>,
}

/// Outcome of [`ArchiveConfig::apply`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Bindings created.
    pub registered: Vec<ArchiveBinding>,
    /// Entities whose extra entries were ignored because they were already bound.
    pub ignored: Vec<String>,
    /// Entries whose registration failed.
    pub failed: Vec<(String, Error)>,
}

impl ArchiveConfig {
    /// Location of `filename` under `root`.
    pub fn path(root: &Path, filename: &str) -> PathBuf {
        root.join("config").join(filename)
    }

    /// Load `<root>/config/<filename>`; `Ok(None)` if the file does not exist.
    pub fn load(
        root: impl AsRef<Path>,
        filename: Option<&str>,
    ) -> Result<Option<Self>, ConfigError> {
        let path = Self::path(root.as_ref(), filename.unwrap_or(DEFAULT_CONFIG_FILE));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no archive configuration");
                return Ok(None);
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Self::from_json_str(&text).map(Some)
    }

    /// Parse a configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Parse an already-decoded configuration document.
    pub fn from_value(value: JsonValue) -> Result<Self, ConfigError> {
        let JsonValue::Object(map) = value else {
            return Err(ConfigError::NotAnObject);
        };

        let mut config = Self::default();
        for (entity, items) in map {
            match parse_entity(&entity, items) {
                Ok(options) => config.entries.extend(options.into_iter().map(|options| {
                    ConfigEntry {
                        entity: entity.clone(),
                        options,
                    }
                })),
                Err(err) => {
                    tracing::warn!(entity = %entity, error = %err, "skipping configuration entry");
                    config.skipped.push(err);
                }
            }
        }
        Ok(config)
    }

    /// Register every entry.
    ///
    /// Failures are logged and collected, never propagated. An entity that
    /// is already bound keeps its first binding.
    pub fn apply<S: Store + ?Sized>(&self, registry: &ArchiveRegistry, store: &S) -> ApplyReport {
        let mut report = ApplyReport::default();

        for entry in &self.entries {
            if !registry.catalog().contains(&entry.entity) {
                let err = ConfigError::UnknownEntity(entry.entity.clone());
                tracing::warn!(
                    entity = %entry.entity,
                    error = %err,
                    "skipping configuration entry"
                );
                report.failed.push((entry.entity.clone(), err.into()));
                continue;
            }
            if registry.binding(&entry.entity).is_some() {
                tracing::warn!(entity = %entry.entity, "entity already bound, ignoring entry");
                report.ignored.push(entry.entity.clone());
                continue;
            }
            match registry.register(store, &entry.entity, entry.options.clone()) {
                Ok(binding) => report.registered.push(binding),
                Err(err) => {
                    tracing::warn!(
                        entity = %entry.entity,
                        error = %err,
                        "failed to register entry"
                    );
                    report.failed.push((entry.entity.clone(), err));
                }
            }
        }
        report
    }
}

fn parse_entity(entity: &str, items: JsonValue) -> Result<Vec<ArchiveOptions>, ConfigError> {
    let JsonValue::Array(mut items) = items else {
        return Err(ConfigError::InvalidEntry {
            entity: entity.to_string(),
            reason: "expected an array of option sets".to_string(),
        });
    };

    let shared = match items.last() {
        Some(JsonValue::Object(last))
            if !(last.contains_key("class") && last.contains_key("table")) =>
        {
            items.pop()
        }
        _ => None,
    };
    let shared = shared
        .map(|value| parse_options(entity, value))
        .transpose()?
        .unwrap_or_default();

    if items.is_empty() {
        return Ok(vec![shared]);
    }
    items
        .into_iter()
        .map(|item| parse_options(entity, item).map(|options| shared.merged(&options)))
        .collect()
}

fn parse_options(entity: &str, value: JsonValue) -> Result<ArchiveOptions, ConfigError> {
    serde_json::from_value(value).map_err(|err| ConfigError::InvalidEntry {
        entity: entity.to_string(),
        reason: err.to_string(),
    })
}
