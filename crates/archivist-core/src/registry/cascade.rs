//! Cascade resolver.
//!
//! When an archived entity owns dependent associations whose targets are
//! archived too, the archive entity gets a mirrored association pointing at
//! the target's archive entity with the same foreign key. Destroying an
//! archived parent then reaches the archived children through ordinary
//! dependent handling, so moves never traverse cascades themselves.

use crate::catalog::{AssociationDef, Catalog, EntityDef};

use super::binding::{ArchiveBinding, CascadeDescriptor};

pub(crate) struct CascadeResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> CascadeResolver<'a> {
    pub(crate) fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Descriptors for `parent`'s dependent associations whose targets have
    /// a forward binding.
    pub(crate) fn resolve(
        &self,
        parent: &EntityDef,
        bindings: &[ArchiveBinding],
    ) -> Vec<CascadeDescriptor> {
        parent
            .dependent_associations()
            .filter_map(|association| {
                let archive_target = bindings
                    .iter()
                    .find(|b| b.is_forward() && b.source == association.target)?;
                descriptor(association, &archive_target.destination)
            })
            .collect()
    }

    /// Define the mirrored associations on `archive_entity`.
    pub(crate) fn wire(&self, archive_entity: &str, descriptors: &[CascadeDescriptor]) {
        for d in descriptors {
            let mirrored = AssociationDef {
                name: d.association.clone(),
                kind: d.kind,
                target: d.archive_target.clone(),
                foreign_key: d.foreign_key.clone(),
                dependent: Some(d.dependent),
            };
            if self.catalog.add_association(archive_entity, mirrored) {
                tracing::debug!(
                    entity = %archive_entity,
                    association = %d.association,
                    target = %d.archive_target,
                    "wired archive cascade"
                );
            }
        }
    }

    /// Wire cascades of already-bound parents that depend on `target`, which
    /// has just been bound.
    pub(crate) fn backfill(&self, bindings: &mut [ArchiveBinding], target: &str) {
        let Some(archive_target) = bindings
            .iter()
            .find(|b| b.is_forward() && b.source == target)
            .map(|b| b.destination.clone())
        else {
            return;
        };

        for binding in bindings
            .iter_mut()
            .filter(|b| b.is_forward() && b.source != target)
        {
            let Some(parent) = self.catalog.get(&binding.source) else {
                continue;
            };
            let fresh: Vec<CascadeDescriptor> = parent
                .dependent_associations()
                .filter(|a| a.target == target)
                .filter(|a| !binding.cascades.iter().any(|c| c.association == a.name))
                .filter_map(|a| descriptor(a, &archive_target))
                .collect();
            self.wire(&binding.destination, &fresh);
            binding.cascades.extend(fresh);
        }
    }
}

fn descriptor(association: &AssociationDef, archive_target: &str) -> Option<CascadeDescriptor> {
    Some(CascadeDescriptor {
        association: association.name.clone(),
        kind: association.kind,
        target: association.target.clone(),
        archive_target: archive_target.to_string(),
        foreign_key: association.foreign_key.clone(),
        dependent: association.dependent?,
    })
}
