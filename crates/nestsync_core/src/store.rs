//! Persistence collaborator interface.
//!
//! The engine performs blocking reads and writes through [`Store`]. It never
//! opens transactions itself: callers wrap a whole sync call in whatever
//! atomic boundary their store offers.

use crate::error::SyncResult;
use crate::key::{Constraint, Key};
use crate::record::Record;
use crate::relation::Pivot;
use serde_json::{Map, Value};

/// Storage operations the engine needs, per entity type.
pub trait Store {
    /// Looks up a row by primary key.
    fn find(&self, entity_type: &str, key_name: &str, key: &Key) -> SyncResult<Option<Record>>;

    /// Keys of every row matching all constraints.
    fn keys_where(&self, entity_type: &str, constraints: &[Constraint]) -> SyncResult<Vec<Key>>;

    /// Writes a new row, assigning a key when the record has none.
    fn insert(&self, record: &mut Record) -> SyncResult<()>;

    /// Overwrites an existing row.
    fn update(&self, record: &Record) -> SyncResult<()>;

    /// Deletes one row.
    fn delete(&self, record: &Record) -> SyncResult<()>;

    /// Reconciles the pivot rows of `parent` to exactly `entries`.
    ///
    /// Rows not listed are detached and new ones attached. For listed rows
    /// the entry's attributes are merged into the stored extras; the row
    /// counts as updated only when that changes something, so an entry
    /// without attributes leaves existing extras alone.
    fn sync_pivot(&self, pivot: &Pivot, parent: &Key, entries: &[PivotEntry]) -> SyncResult<PivotChanges>;
}

/// One desired pivot row.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotEntry {
    /// Key of the related row.
    pub related: Key,
    /// Extra pivot attributes to store.
    pub attributes: Map<String, Value>,
}

impl PivotEntry {
    /// Creates an entry without extra attributes.
    pub fn new(related: Key) -> Self {
        Self {
            related,
            attributes: Map::new(),
        }
    }

    /// Sets the extra attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// What a pivot reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotChanges {
    /// Newly linked related keys.
    pub attached: Vec<Key>,
    /// Unlinked related keys.
    pub detached: Vec<Key>,
    /// Related keys whose extra attributes changed.
    pub updated: Vec<Key>,
}

impl PivotChanges {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty() && self.updated.is_empty()
    }
}
