//! Association definitions between entities.

use serde::{Deserialize, Serialize};

/// Shape of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// Foreign key lives on the target; many targets per owner.
    HasMany,
    /// Foreign key lives on the target; at most one target per owner.
    HasOne,
    /// Foreign key lives on the owner.
    BelongsTo,
}

/// What happens to associated rows when the owner is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependent {
    /// Destroy each associated row, recursing into its own dependents.
    Destroy,
    /// Delete associated rows with a single statement, without recursing.
    DeleteAll,
}

/// An association from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDef {
    /// Association name (unique within the owning entity).
    pub name: String,
    /// Association shape.
    pub kind: AssociationKind,
    /// Target entity name.
    pub target: String,
    /// Foreign key column.
    pub foreign_key: String,
    /// Dependent behavior, if any.
    #[serde(default)]
    pub dependent: Option<Dependent>,
}

impl AssociationDef {
    fn new(
        name: impl Into<String>,
        kind: AssociationKind,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: foreign_key.into(),
            dependent: None,
        }
    }

    /// Create a has-many association.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, AssociationKind::HasMany, target, foreign_key)
    }

    /// Create a has-one association.
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, AssociationKind::HasOne, target, foreign_key)
    }

    /// Create a belongs-to association.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, AssociationKind::BelongsTo, target, foreign_key)
    }

    /// Set dependent behavior.
    pub fn with_dependent(mut self, dependent: Dependent) -> Self {
        self.dependent = Some(dependent);
        self
    }

    /// Check if destroying the owner affects the target.
    pub fn is_dependent(&self) -> bool {
        self.dependent.is_some()
    }
}
