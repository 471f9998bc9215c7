//! Archive registry.
//!
//! Maps each archivable entity to its destination entity and the resolved
//! options used when moving rows between them.

mod binding;
mod cascade;
mod options;
mod registry;

pub use binding::{ArchiveBinding, CascadeDescriptor, Direction};
pub use options::{ArchiveOptions, DEFAULT_MAGIC_COLUMN, RESTORE_MAGIC_COLUMN};
pub use registry::{ArchiveRegistry, SchemaSyncEntry, SyncReport};
