//! Change journal.

use nestsync_core::Key;
use std::fmt;

/// One write performed through the [`Store`](nestsync_core::Store) interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A row was inserted.
    Created {
        /// The table.
        entity_type: String,
        /// Key of the new row.
        key: Key,
    },
    /// A row was overwritten.
    Updated {
        /// The table.
        entity_type: String,
        /// Key of the row.
        key: Key,
    },
    /// A row was deleted.
    Deleted {
        /// The table.
        entity_type: String,
        /// Key of the row.
        key: Key,
    },
    /// A pivot row was added.
    Attached {
        /// The pivot table.
        table: String,
        /// Key of the owning side.
        parent: Key,
        /// Key of the related side.
        related: Key,
    },
    /// A pivot row was removed.
    Detached {
        /// The pivot table.
        table: String,
        /// Key of the owning side.
        parent: Key,
        /// Key of the related side.
        related: Key,
    },
    /// Extra attributes of a pivot row changed.
    PivotUpdated {
        /// The pivot table.
        table: String,
        /// Key of the owning side.
        parent: Key,
        /// Key of the related side.
        related: Key,
    },
}

impl StoreEvent {
    /// The entity or pivot table the event touched.
    pub fn table(&self) -> &str {
        match self {
            StoreEvent::Created { entity_type, .. }
            | StoreEvent::Updated { entity_type, .. }
            | StoreEvent::Deleted { entity_type, .. } => entity_type,
            StoreEvent::Attached { table, .. }
            | StoreEvent::Detached { table, .. }
            | StoreEvent::PivotUpdated { table, .. } => table,
        }
    }

    /// Returns true for row deletions.
    pub fn is_delete(&self) -> bool {
        matches!(self, StoreEvent::Deleted { .. })
    }

    /// Returns true for pivot changes.
    pub fn is_pivot(&self) -> bool {
        matches!(
            self,
            StoreEvent::Attached { .. } | StoreEvent::Detached { .. } | StoreEvent::PivotUpdated { .. }
        )
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEvent::Created { entity_type, key } => write!(f, "create {entity_type}#{key}"),
            StoreEvent::Updated { entity_type, key } => write!(f, "update {entity_type}#{key}"),
            StoreEvent::Deleted { entity_type, key } => write!(f, "delete {entity_type}#{key}"),
            StoreEvent::Attached {
                table,
                parent,
                related,
            } => write!(f, "attach {table} {parent}->{related}"),
            StoreEvent::Detached {
                table,
                parent,
                related,
            } => write!(f, "detach {table} {parent}->{related}"),
            StoreEvent::PivotUpdated {
                table,
                parent,
                related,
            } => write!(f, "update pivot {table} {parent}->{related}"),
        }
    }
}
