//! In-memory store.

use crate::error::{StoreError, StoreResult};
use crate::journal::StoreEvent;
use nestsync_core::{
    matches_all, Constraint, Key, Pivot, PivotChanges, PivotEntry, Record, Store, SyncResult,
};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};
use uuid::Uuid;

type Row = Map<String, Value>;

/// How a table assigns keys to inserted rows that have none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Integer keys counting up from the largest seen so far.
    #[default]
    Increment,
    /// Random v4 UUID strings.
    Uuid,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<String, BTreeMap<Key, Row>>,
    pivots: BTreeMap<String, Vec<Row>>,
    last_ids: BTreeMap<String, i64>,
}

impl Tables {
    fn next_key(&mut self, entity_type: &str, strategy: KeyStrategy) -> Key {
        match strategy {
            KeyStrategy::Increment => {
                let last = self.last_ids.entry(entity_type.to_string()).or_insert(0);
                *last += 1;
                Key::Int(*last)
            }
            KeyStrategy::Uuid => Key::Str(Uuid::new_v4().to_string()),
        }
    }

    fn put_new(&mut self, entity_type: &str, key: Key, row: Row) -> StoreResult<()> {
        if let Key::Int(id) = key {
            let last = self.last_ids.entry(entity_type.to_string()).or_insert(0);
            *last = (*last).max(id);
        }
        let table = self.rows.entry(entity_type.to_string()).or_default();
        if table.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                entity_type: entity_type.to_string(),
                key,
            });
        }
        table.insert(key, row);
        Ok(())
    }
}

/// A thread-safe in-memory [`Store`].
///
/// Rows are JSON attribute maps keyed by [`Key`], pivot tables are plain
/// row lists. Every write made through the [`Store`] interface is recorded
/// in a journal; seeding helpers bypass it.
///
/// # Example
///
/// ```rust
/// use nestsync_core::{Record, Store};
/// use nestsync_store::MemoryStore;
///
/// let store = MemoryStore::new();
/// let mut post = Record::new("posts", "id");
/// post.set("title", "Hello");
/// store.insert(&mut post).unwrap();
/// assert_eq!(post.get("id"), Some(&serde_json::json!(1)));
/// assert_eq!(store.journal().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    journal: RwLock<Vec<StoreEvent>>,
    strategies: BTreeMap<String, KeyStrategy>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key strategy of one table.
    #[must_use]
    pub fn with_key_strategy(mut self, entity_type: impl Into<String>, strategy: KeyStrategy) -> Self {
        self.strategies.insert(entity_type.into(), strategy);
        self
    }

    fn strategy(&self, entity_type: &str) -> KeyStrategy {
        self.strategies.get(entity_type).copied().unwrap_or_default()
    }

    fn log(&self, event: StoreEvent) {
        trace!(%event, "store write");
        self.journal.write().push(event);
    }

    /// Runs `f`, restoring every table and the journal if it fails.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
    {
        let snapshot = self.tables.read().clone();
        let journal_len = self.journal.read().len();

        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self.tables.write() = snapshot;
                self.journal.write().truncate(journal_len);
                debug!("transaction rolled back");
                Err(err)
            }
        }
    }

    /// Seeds a row without journaling it, assigning a key when `key_name`
    /// is missing from `row`.
    pub fn insert_row(&self, entity_type: &str, key_name: &str, mut row: Row) -> StoreResult<Key> {
        let mut tables = self.tables.write();
        let key = match Key::from_field(&row, key_name) {
            Some(key) => key,
            None => {
                let key = tables.next_key(entity_type, self.strategy(entity_type));
                row.insert(key_name.to_string(), key.to_value());
                key
            }
        };
        tables.put_new(entity_type, key.clone(), row)?;
        Ok(key)
    }

    /// Seeds a pivot row without journaling it.
    pub fn attach_row(&self, pivot: &Pivot, parent: &Key, related: &Key, extras: Row) {
        let mut row = extras;
        row.insert(pivot.foreign_pivot_key.clone(), parent.to_value());
        row.insert(pivot.related_pivot_key.clone(), related.to_value());
        self.tables
            .write()
            .pivots
            .entry(pivot.table.clone())
            .or_default()
            .push(row);
    }

    /// Every row of a table, in key order.
    pub fn rows(&self, entity_type: &str) -> Vec<Row> {
        self.tables
            .read()
            .rows
            .get(entity_type)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One row by key.
    pub fn row(&self, entity_type: &str, key: impl Into<Key>) -> Option<Row> {
        let key = key.into();
        self.tables
            .read()
            .rows
            .get(entity_type)
            .and_then(|table| table.get(&key).cloned())
    }

    /// Number of rows in a table.
    pub fn count(&self, entity_type: &str) -> usize {
        self.tables
            .read()
            .rows
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    /// Every row of a pivot table, in insertion order.
    pub fn pivot_rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .pivots
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Related keys linked to `parent` through `pivot`, sorted.
    pub fn attached_keys(&self, pivot: &Pivot, parent: &Key) -> Vec<Key> {
        let tables = self.tables.read();
        let mut keys: Vec<Key> = tables
            .pivots
            .get(&pivot.table)
            .into_iter()
            .flatten()
            .filter(|row| pivot_key(row, &pivot.foreign_pivot_key).as_ref() == Some(parent))
            .filter_map(|row| pivot_key(row, &pivot.related_pivot_key))
            .collect();
        keys.sort();
        keys
    }

    /// A copy of the journal.
    pub fn journal(&self) -> Vec<StoreEvent> {
        self.journal.read().clone()
    }

    /// Empties the journal.
    pub fn clear_journal(&self) {
        self.journal.write().clear();
    }
}

fn pivot_key(row: &Row, column: &str) -> Option<Key> {
    row.get(column).and_then(Key::from_value)
}

fn owned_by(row: &Row, pivot: &Pivot, parent: &Key) -> bool {
    pivot_key(row, &pivot.foreign_pivot_key).as_ref() == Some(parent)
}

impl Store for MemoryStore {
    fn find(&self, entity_type: &str, key_name: &str, key: &Key) -> SyncResult<Option<Record>> {
        let tables = self.tables.read();
        let found = tables
            .rows
            .get(entity_type)
            .and_then(|table| table.get(key))
            .map(|row| Record::from_storage(entity_type, key_name, row.clone()));
        trace!(entity_type, %key, found = found.is_some(), "find");
        Ok(found)
    }

    fn keys_where(&self, entity_type: &str, constraints: &[Constraint]) -> SyncResult<Vec<Key>> {
        let tables = self.tables.read();
        Ok(tables
            .rows
            .get(entity_type)
            .into_iter()
            .flatten()
            .filter(|(_, row)| matches_all(constraints, row))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn insert(&self, record: &mut Record) -> SyncResult<()> {
        let entity_type = record.entity_type().to_string();
        let key = {
            let mut tables = self.tables.write();
            let key = match record.key() {
                Some(key) => key,
                None => {
                    let key = tables.next_key(&entity_type, self.strategy(&entity_type));
                    record.set_key(&key);
                    key
                }
            };
            tables.put_new(&entity_type, key.clone(), record.attributes().clone())?;
            key
        };
        self.log(StoreEvent::Created { entity_type, key });
        Ok(())
    }

    fn update(&self, record: &Record) -> SyncResult<()> {
        let entity_type = record.entity_type().to_string();
        let key = record.key().ok_or_else(|| StoreError::MissingKey {
            entity_type: entity_type.clone(),
        })?;
        {
            let mut tables = self.tables.write();
            let row = tables
                .rows
                .get_mut(&entity_type)
                .and_then(|table| table.get_mut(&key))
                .ok_or_else(|| StoreError::RowNotFound {
                    entity_type: entity_type.clone(),
                    key: key.clone(),
                })?;
            *row = record.attributes().clone();
        }
        self.log(StoreEvent::Updated { entity_type, key });
        Ok(())
    }

    fn delete(&self, record: &Record) -> SyncResult<()> {
        let entity_type = record.entity_type().to_string();
        let key = record.key().ok_or_else(|| StoreError::MissingKey {
            entity_type: entity_type.clone(),
        })?;
        let removed = self
            .tables
            .write()
            .rows
            .get_mut(&entity_type)
            .and_then(|table| table.remove(&key));
        if removed.is_none() {
            return Err(StoreError::RowNotFound { entity_type, key }.into());
        }
        self.log(StoreEvent::Deleted { entity_type, key });
        Ok(())
    }

    fn sync_pivot(&self, pivot: &Pivot, parent: &Key, entries: &[PivotEntry]) -> SyncResult<PivotChanges> {
        let mut changes = PivotChanges::default();
        {
            let mut tables = self.tables.write();
            let rows = tables.pivots.entry(pivot.table.clone()).or_default();

            rows.retain(|row| {
                if !owned_by(row, pivot, parent) {
                    return true;
                }
                match pivot_key(row, &pivot.related_pivot_key) {
                    Some(related) if entries.iter().any(|e| e.related == related) => true,
                    Some(related) => {
                        changes.detached.push(related);
                        false
                    }
                    None => false,
                }
            });

            for entry in entries {
                let existing = rows.iter_mut().find(|row| {
                    owned_by(row, pivot, parent)
                        && pivot_key(row, &pivot.related_pivot_key).as_ref() == Some(&entry.related)
                });
                match existing {
                    Some(row) => {
                        let mut changed = false;
                        for (column, value) in &entry.attributes {
                            if row.get(column) != Some(value) {
                                row.insert(column.clone(), value.clone());
                                changed = true;
                            }
                        }
                        if changed {
                            changes.updated.push(entry.related.clone());
                        }
                    }
                    None => {
                        let mut row = entry.attributes.clone();
                        row.insert(pivot.foreign_pivot_key.clone(), parent.to_value());
                        row.insert(pivot.related_pivot_key.clone(), entry.related.to_value());
                        rows.push(row);
                        changes.attached.push(entry.related.clone());
                    }
                }
            }
        }

        let link = |related: &Key| (pivot.table.clone(), parent.clone(), related.clone());
        let events: Vec<StoreEvent> = changes
            .detached
            .iter()
            .map(|related| {
                let (table, parent, related) = link(related);
                StoreEvent::Detached { table, parent, related }
            })
            .chain(changes.attached.iter().map(|related| {
                let (table, parent, related) = link(related);
                StoreEvent::Attached { table, parent, related }
            }))
            .chain(changes.updated.iter().map(|related| {
                let (table, parent, related) = link(related);
                StoreEvent::PivotUpdated { table, parent, related }
            }))
            .collect();
        for event in events {
            self.log(event);
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestsync_core::SyncError;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn post_tag() -> Pivot {
        Pivot {
            table: "post_tag".into(),
            foreign_pivot_key: "post_id".into(),
            related_pivot_key: "tag_id".into(),
        }
    }

    #[test]
    fn insert_assigns_increment_keys() {
        let store = MemoryStore::new();
        store.insert_row("posts", "id", row(json!({"id": 7}))).unwrap();

        let mut post = Record::new("posts", "id");
        post.set("title", "next");
        store.insert(&mut post).unwrap();
        assert_eq!(post.key(), Some(Key::Int(8)));
        assert_eq!(store.count("posts"), 2);
        assert_eq!(
            store.journal(),
            vec![StoreEvent::Created {
                entity_type: "posts".into(),
                key: Key::Int(8)
            }]
        );
    }

    #[test]
    fn uuid_strategy() {
        let store = MemoryStore::new().with_key_strategy("users", KeyStrategy::Uuid);
        let key = store.insert_row("users", "uuid", Row::new()).unwrap();
        let Key::Str(uuid) = &key else {
            panic!("expected a string key");
        };
        assert_eq!(uuid.len(), 36);
        assert!(store.row("users", key).is_some());
    }

    #[test]
    fn duplicate_insert_fails() {
        let store = MemoryStore::new();
        store.insert_row("posts", "id", row(json!({"id": 1}))).unwrap();
        let mut post = Record::new("posts", "id");
        post.set("id", 1);
        assert!(matches!(store.insert(&mut post), Err(SyncError::Storage { .. })));
    }

    #[test]
    fn find_update_delete() {
        let store = MemoryStore::new();
        store
            .insert_row("comments", "id", row(json!({"id": 1, "post_id": 4, "body": "a"})))
            .unwrap();
        store
            .insert_row("comments", "id", row(json!({"id": 2, "post_id": 5, "body": "b"})))
            .unwrap();

        let mut comment = store.find("comments", "id", &Key::Int(1)).unwrap().unwrap();
        assert!(comment.exists());
        comment.set("body", "edited");
        store.update(&comment).unwrap();
        assert_eq!(store.row("comments", Key::Int(1)).unwrap()["body"], json!("edited"));

        let keys = store
            .keys_where("comments", &[Constraint::new("post_id", "4")])
            .unwrap();
        assert_eq!(keys, vec![Key::Int(1)]);

        store.delete(&comment).unwrap();
        assert!(store.find("comments", "id", &Key::Int(1)).unwrap().is_none());
        assert!(matches!(store.delete(&comment), Err(SyncError::Storage { .. })));
    }

    #[test]
    fn pivot_reconciliation() {
        let store = MemoryStore::new();
        let pivot = post_tag();
        let post = Key::Int(1);
        for tag in 1..=3 {
            store.attach_row(&pivot, &post, &Key::Int(tag), row(json!({"weight": 0})));
        }
        store.attach_row(&pivot, &Key::Int(2), &Key::Int(1), Row::new());

        let entries = vec![
            PivotEntry::new(Key::Int(2)).with_attributes(row(json!({"weight": 5}))),
            PivotEntry::new(Key::Int(4)),
        ];
        let changes = store.sync_pivot(&pivot, &post, &entries).unwrap();
        assert_eq!(changes.detached, vec![Key::Int(1), Key::Int(3)]);
        assert_eq!(changes.attached, vec![Key::Int(4)]);
        assert_eq!(changes.updated, vec![Key::Int(2)]);

        assert_eq!(store.attached_keys(&pivot, &post), vec![Key::Int(2), Key::Int(4)]);
        assert_eq!(store.attached_keys(&pivot, &Key::Int(2)), vec![Key::Int(1)]);

        let again = store.sync_pivot(&pivot, &post, &entries).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = MemoryStore::new();
        store.insert_row("posts", "id", row(json!({"id": 1}))).unwrap();

        let result: Result<(), SyncError> = store.transaction(|store| {
            let mut post = Record::new("posts", "id");
            store.insert(&mut post)?;
            Err(SyncError::invalid_operation("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.count("posts"), 1);
        assert!(store.journal().is_empty());

        let key = store
            .transaction(|store| {
                let mut post = Record::new("posts", "id");
                store.insert(&mut post)?;
                Ok::<_, SyncError>(post.key())
            })
            .unwrap();
        assert_eq!(key, Some(Key::Int(2)));
        assert_eq!(store.count("posts"), 2);
    }

    fn key_set_strategy() -> impl Strategy<Value = BTreeSet<i64>> {
        prop::collection::btree_set(1i64..=8, 0..=8)
    }

    proptest! {
        #[test]
        fn sync_pivot_converges_to_the_submitted_set(
            linked in key_set_strategy(),
            wanted in key_set_strategy(),
        ) {
            let store = MemoryStore::new();
            let pivot = post_tag();
            let (post, other) = (Key::Int(1), Key::Int(2));
            for tag in &linked {
                store.attach_row(&pivot, &post, &Key::Int(*tag), Row::new());
            }
            store.attach_row(&pivot, &other, &Key::Int(1), Row::new());

            let entries: Vec<PivotEntry> = wanted.iter().map(|tag| PivotEntry::new(Key::Int(*tag))).collect();
            let changes = store.sync_pivot(&pivot, &post, &entries).unwrap();

            let as_keys = |tags: Vec<&i64>| tags.into_iter().map(|t| Key::Int(*t)).collect::<Vec<_>>();
            prop_assert_eq!(store.attached_keys(&pivot, &post), as_keys(wanted.iter().collect()));
            prop_assert_eq!(changes.attached, as_keys(wanted.difference(&linked).collect()));
            let mut detached = changes.detached;
            detached.sort();
            prop_assert_eq!(detached, as_keys(linked.difference(&wanted).collect()));
            prop_assert!(changes.updated.is_empty());
            prop_assert_eq!(store.attached_keys(&pivot, &other), vec![Key::Int(1)]);
        }
    }
}
