//! Entity definitions.

use serde::{Deserialize, Serialize};

use super::association::AssociationDef;

fn default_primary_key() -> String {
    "id".to_string()
}

/// An entity definition (a table plus its associations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Backing table name.
    pub table: String,
    /// Primary key column.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Associations to other entities.
    #[serde(default)]
    pub associations: Vec<AssociationDef>,
}

impl EntityDef {
    /// Create a new entity definition with an `id` primary key.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            associations: Vec::new(),
        }
    }

    /// Set the primary key column.
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Add an association.
    pub fn with_association(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }

    /// Get an association by name.
    pub fn association(&self, name: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Associations that act on the target when the owner is destroyed.
    pub fn dependent_associations(&self) -> impl Iterator<Item = &AssociationDef> {
        self.associations.iter().filter(|a| a.is_dependent())
    }
}
