//! Row mover.
//!
//! Copies the rows matching a predicate from a binding's source table into
//! its destination with one `INSERT INTO ... SELECT`, stamping the magic
//! column, and optionally deletes them from the source in the same
//! transaction.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::predicate::{quote_identifier, Predicate};
use crate::registry::ArchiveBinding;
use crate::store::Store;
use crate::value::quote_literal;

/// Format of timestamps written into magic and timestamp columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

/// Per-move overrides of a binding's options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOptions {
    /// Replaces the binding's base conditions for this move.
    pub conditions: Option<String>,
    /// Replaces the binding's copy flag for this move.
    pub copy: Option<bool>,
    /// Carry the source's magic column over instead of stamping it.
    pub migrate: bool,
}

impl MoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn with_copy(mut self, copy: bool) -> Self {
        self.copy = Some(copy);
        self
    }

    pub fn with_migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }
}

/// One move: which binding, which rows, and how.
#[derive(Debug, Clone)]
pub struct MoveRequest<'a> {
    pub binding: &'a ArchiveBinding,
    pub predicate: Predicate,
    pub options: MoveOptions,
}

impl<'a> MoveRequest<'a> {
    pub fn new(binding: &'a ArchiveBinding, predicate: Predicate) -> Self {
        Self {
            binding,
            predicate,
            options: MoveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MoveOptions) -> Self {
        self.options = options;
        self
    }

    /// Effective row filter: the base conditions ANDed with the predicate.
    pub fn filter(&self) -> Predicate {
        let base = self
            .options
            .conditions
            .as_deref()
            .or(self.binding.conditions.as_deref());
        Predicate::from_conditions(base).and(self.predicate.clone())
    }

    /// Effective copy flag.
    pub fn copy_only(&self) -> bool {
        self.options.copy.unwrap_or(self.binding.copy)
    }
}

/// SQL for one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// `INSERT INTO destination ... SELECT ... FROM source WHERE ...`.
    pub insert: String,
    /// `DELETE FROM source WHERE ...`, absent for copy-only moves.
    pub delete: Option<String>,
}

impl MovePlan {
    /// Statements in execution order.
    pub fn statements(&self) -> Vec<String> {
        std::iter::once(self.insert.clone())
            .chain(self.delete.clone())
            .collect()
    }
}

/// Rows affected by a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveReport {
    pub copied: usize,
    pub deleted: usize,
}

/// Builds and runs moves.
pub struct RowMover;

impl RowMover {
    /// Render the statements for `request` as of `now`.
    pub fn plan(request: &MoveRequest<'_>, now: DateTime<Utc>) -> MovePlan {
        let binding = request.binding;
        let stamp = quote_literal(&now.format(TIMESTAMP_FORMAT).to_string());
        let stamps_timestamps =
            |column: &str| binding.timestamps && TIMESTAMP_COLUMNS.contains(&column);

        let mut targets = Vec::with_capacity(binding.transferred.len() + 1);
        let mut values = Vec::with_capacity(binding.transferred.len() + 1);
        for column in &binding.transferred {
            targets.push(quote_identifier(column));
            if stamps_timestamps(column) {
                values.push(stamp.clone());
            } else {
                values.push(quote_identifier(column));
            }
        }

        if binding.stamp_magic {
            targets.push(quote_identifier(&binding.magic));
            if request.options.migrate && binding.carries_magic {
                values.push(quote_identifier(&binding.magic));
            } else {
                values.push(stamp);
            }
        }

        let filter = request.filter().where_clause();
        let insert = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}{}",
            quote_identifier(&binding.destination_table),
            targets.join(", "),
            values.join(", "),
            quote_identifier(&binding.source_table),
            filter
        );
        let delete = (!request.copy_only()).then(|| {
            format!(
                "DELETE FROM {}{}",
                quote_identifier(&binding.source_table),
                filter
            )
        });

        MovePlan { insert, delete }
    }

    /// Run `request` in one transaction.
    pub fn run<S: Store + ?Sized>(
        store: &S,
        request: &MoveRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<MoveReport> {
        let binding = request.binding;
        let plan = Self::plan(request, now);
        let counts = store
            .execute_atomic(&plan.statements())
            .map_err(|source| Error::Move {
                source_table: binding.source_table.clone(),
                destination_table: binding.destination_table.clone(),
                source,
            })?;

        let report = MoveReport {
            copied: counts.first().copied().unwrap_or(0),
            deleted: counts.get(1).copied().unwrap_or(0),
        };
        tracing::debug!(
            source = %binding.source_table,
            destination = %binding.destination_table,
            copied = report.copied,
            deleted = report.deleted,
            "moved rows"
        );
        Ok(report)
    }
}
