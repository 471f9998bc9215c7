//! Catalog of entity definitions.

use parking_lot::RwLock;

use super::{AssociationDef, EntityDef};

/// Thread-safe registry of entity definitions, in definition order.
#[derive(Debug, Default)]
pub struct Catalog {
    entities: RwLock<Vec<EntityDef>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the given entities.
    pub fn with_entities(entities: impl IntoIterator<Item = EntityDef>) -> Self {
        let catalog = Self::new();
        for entity in entities {
            catalog.define(entity);
        }
        catalog
    }

    /// Define an entity, replacing any existing definition with the same name.
    pub fn define(&self, entity: EntityDef) {
        let mut entities = self.entities.write();
        match entities.iter_mut().find(|e| e.name == entity.name) {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }
    }

    /// Get an entity definition by name.
    pub fn get(&self, name: &str) -> Option<EntityDef> {
        self.entities.read().iter().find(|e| e.name == name).cloned()
    }

    /// Check if an entity is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.read().iter().any(|e| e.name == name)
    }

    /// Get the entity backed by a table, ignoring ASCII case.
    pub fn by_table(&self, table: &str) -> Option<EntityDef> {
        self.entities
            .read()
            .iter()
            .find(|e| e.table.eq_ignore_ascii_case(table))
            .cloned()
    }

    /// Point an entity at a different table. Returns false if it is not defined.
    pub fn set_table(&self, name: &str, table: impl Into<String>) -> bool {
        match self.entities.write().iter_mut().find(|e| e.name == name) {
            Some(entity) => {
                entity.table = table.into();
                true
            }
            None => false,
        }
    }

    /// Add an association to an entity, replacing one with the same name.
    /// Returns false if the entity is not defined.
    pub fn add_association(&self, name: &str, association: AssociationDef) -> bool {
        let mut entities = self.entities.write();
        let Some(entity) = entities.iter_mut().find(|e| e.name == name) else {
            return false;
        };
        match entity
            .associations
            .iter_mut()
            .find(|a| a.name == association.name)
        {
            Some(existing) => *existing = association,
            None => entity.associations.push(association),
        }
        true
    }

    /// All entity definitions.
    pub fn entities(&self) -> Vec<EntityDef> {
        self.entities.read().clone()
    }
}
