//! Host entity catalog.
//!
//! Describes the entities (tables) the archival layer operates on and the
//! associations between them. Archive entities synthesized at registration
//! time live in the same catalog as the entities they mirror.

mod association;
mod catalog;
mod entity;

pub use association::{AssociationDef, AssociationKind, Dependent};
pub use catalog::Catalog;
pub use entity::EntityDef;
