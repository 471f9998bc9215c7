//! Subcommand dispatch.

use archivist_core::{Archivist, ConfigError, DeleteRequest, Predicate, SqliteStore, Value};

use crate::error::CliError;
use crate::formatter::Formatter;
use crate::Command;

/// Run one subcommand, returning its formatted output.
pub fn run(
    archivist: &Archivist<SqliteStore>,
    command: Command,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    match command {
        Command::Bindings => Ok(formatter.format_bindings(&archivist.registry().bindings())),

        Command::Exec { sql } => {
            let affected = archivist.execute(&sql)?;
            Ok(formatter.format_affected(affected, ""))
        }

        Command::Destroy { entity, id } => {
            let affected = archivist.destroy(&entity, Value::parse_literal(&id))?;
            Ok(formatter.format_affected(affected, "archived"))
        }

        Command::Copy { entity, filter } => {
            let def = archivist
                .catalog()
                .get(&entity)
                .ok_or(ConfigError::UnknownEntity(entity))?;
            let request =
                DeleteRequest::new(def.table, Predicate::from_conditions(filter.as_deref()));
            let copied = archivist
                .copy_to_archive(&request)?
                .iter()
                .map(|report| report.copied)
                .sum();
            Ok(formatter.format_affected(copied, "copied"))
        }

        Command::Restore { entity, filter } => {
            let predicate = Predicate::from_conditions(filter.as_deref());
            let affected = archivist.restore(&entity, predicate)?;
            Ok(formatter.format_affected(affected, "restored"))
        }

        Command::ArchiveAll { entity, conditions } => {
            let affected = archivist.archive_all(&entity, conditions.as_deref())?;
            Ok(formatter.format_affected(affected, "archived"))
        }

        Command::MigrateLegacy { entities } => {
            let entities = if entities.is_empty() {
                bound_entities(archivist)
            } else {
                entities
            };
            let reports = entities
                .iter()
                .map(|entity| archivist.run_legacy_migration(entity))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(formatter.format_migrations(&reports))
        }

        Command::SyncSchema => {
            let report = archivist.sync_schema()?;
            Ok(formatter.format_sync(&report))
        }
    }
}

/// Sources of forward bindings, in registration order.
fn bound_entities(archivist: &Archivist<SqliteStore>) -> Vec<String> {
    archivist
        .registry()
        .bindings()
        .into_iter()
        .filter(|b| b.is_forward())
        .map(|b| b.source)
        .collect()
}
