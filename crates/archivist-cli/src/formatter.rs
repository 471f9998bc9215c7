//! Output formatters.

use archivist_core::{ArchiveBinding, LegacyMigrationReport, SyncReport};
use clap::ValueEnum;
use comfy_table::{Cell, Table};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format registered bindings.
    fn format_bindings(&self, bindings: &[ArchiveBinding]) -> String;

    /// Format an affected-row count.
    fn format_affected(&self, affected: usize, message: &str) -> String;

    /// Format legacy migration reports.
    fn format_migrations(&self, reports: &[LegacyMigrationReport]) -> String;

    /// Format a schema sync report.
    fn format_sync(&self, report: &SyncReport) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_bindings(&self, bindings: &[ArchiveBinding]) -> String {
        if bindings.is_empty() {
            return "No bindings".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec![
            "Source",
            "Table",
            "Destination",
            "Destination Table",
            "Direction",
            "Magic",
            "Cascades",
        ]);
        for binding in bindings {
            let cascades: Vec<&str> = binding
                .cascades
                .iter()
                .map(|c| c.association.as_str())
                .collect();
            table.add_row(vec![
                Cell::new(&binding.source),
                Cell::new(&binding.source_table),
                Cell::new(&binding.destination),
                Cell::new(&binding.destination_table),
                Cell::new(binding.direction),
                Cell::new(&binding.magic),
                Cell::new(cascades.join(", ")),
            ]);
        }
        table.to_string()
    }

    fn format_affected(&self, affected: usize, message: &str) -> String {
        if message.is_empty() {
            format!("{} row(s) affected", affected)
        } else {
            format!("{} row(s) affected: {}", affected, message)
        }
    }

    fn format_migrations(&self, reports: &[LegacyMigrationReport]) -> String {
        reports
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_sync(&self, report: &SyncReport) -> String {
        if report.is_empty() {
            return "Archive schema up to date".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Table", "Change"]);
        for created in &report.created {
            table.add_row(vec![created.as_str(), "created"]);
        }
        for (table_name, column) in &report.added {
            table.add_row(vec![table_name.clone(), format!("added column {}", column)]);
        }
        table.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_bindings(&self, bindings: &[ArchiveBinding]) -> String {
        let rows: Vec<serde_json::Value> = bindings
            .iter()
            .map(|b| {
                serde_json::json!({
                    "source": b.source,
                    "source_table": b.source_table,
                    "destination": b.destination,
                    "destination_table": b.destination_table,
                    "direction": b.direction.to_string(),
                    "magic": b.magic,
                    "transferred": b.transferred,
                    "conditions": b.conditions,
                    "cascades": b.cascades.iter().map(|c| &c.association).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_affected(&self, affected: usize, message: &str) -> String {
        serde_json::json!({
            "affected": affected,
            "message": message
        })
        .to_string()
    }

    fn format_migrations(&self, reports: &[LegacyMigrationReport]) -> String {
        let rows: Vec<serde_json::Value> = reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "entity": r.entity,
                    "moved": r.moved,
                    "elapsed_secs": r.elapsed.as_secs_f64(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_sync(&self, report: &SyncReport) -> String {
        serde_json::json!({
            "created": report.created,
            "added": report.added,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_table_affected() {
        let formatter = TableFormatter;
        assert_eq!(formatter.format_affected(3, ""), "3 row(s) affected");
        assert_eq!(
            formatter.format_affected(1, "archived"),
            "1 row(s) affected: archived"
        );
    }

    #[test]
    fn test_json_migrations() {
        let formatter = JsonFormatter;
        let output = formatter.format_migrations(&[LegacyMigrationReport {
            entity: "Post".to_string(),
            moved: 3,
            elapsed: Duration::from_millis(5),
        }]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["moved"], 3);
    }

    #[test]
    fn test_empty_sync() {
        assert_eq!(
            TableFormatter.format_sync(&SyncReport::default()),
            "Archive schema up to date"
        );
    }
}
