//! Source-to-archive column projection.

use super::column::{ColumnDef, ColumnType};

/// Rules applied when projecting a source schema onto a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionRules {
    /// Columns appended to the destination (typically the magic column).
    pub add: Vec<ColumnDef>,
    /// Source columns never transferred (typically the magic column itself).
    pub ignore: Vec<String>,
    /// Source columns removed from the destination (typically the reverse magic column).
    pub subtract: Vec<String>,
}

impl ProjectionRules {
    /// Rules for an archive table keyed by `magic`.
    pub fn archive(magic: &str, reverse_magic: &str) -> Self {
        Self {
            add: vec![ColumnDef::new(magic, ColumnType::DateTime)],
            ignore: vec![magic.to_string()],
            subtract: vec![reverse_magic.to_string()],
        }
    }

    fn excludes(&self, name: &str) -> bool {
        self.ignore.iter().any(|c| c == name) || self.subtract.iter().any(|c| c == name)
    }
}

/// Result of projecting a source schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Destination column set.
    pub columns: Vec<ColumnDef>,
    /// Source columns copied verbatim into the destination.
    pub transferred: Vec<String>,
}

impl Projection {
    /// Names of the destination columns.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Project `source` columns through `rules`.
pub fn project(source: &[ColumnDef], rules: &ProjectionRules) -> Projection {
    let kept: Vec<ColumnDef> = source
        .iter()
        .filter(|c| !rules.excludes(&c.name))
        .cloned()
        .collect();
    let transferred = kept.iter().map(|c| c.name.clone()).collect();

    let mut columns = kept;
    for added in &rules.add {
        if !columns.iter().any(|c| c.name == added.name) {
            columns.push(added.clone());
        }
    }

    Projection {
        columns,
        transferred,
    }
}
