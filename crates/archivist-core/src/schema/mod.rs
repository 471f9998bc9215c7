//! Column definitions and the schema projector.
//!
//! The projector computes an archive table's columns from its source
//! table's columns. It runs once per binding at registration time; moves
//! rely on the destination already matching.

mod column;
mod projector;

pub use column::{ColumnDef, ColumnType};
pub use projector::{project, Projection, ProjectionRules};
