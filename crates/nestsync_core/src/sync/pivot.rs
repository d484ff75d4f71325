//! Many-to-many reconciliation.

use super::{Run, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::record::Record;
use crate::relation::{BelongsToMany, RelationKind};
use crate::resolver::item_key;
use crate::store::{PivotEntry, Store};
use serde_json::{Map, Value};
use tracing::debug;

impl<S: Store + ?Sized> SyncEngine<'_, S> {
    /// Replaces the association set of `parent` with the submitted keys.
    ///
    /// Items without a key are dropped. Extra pivot attributes come from the
    /// configured pivot field, minus both pivot key columns and the ignored
    /// timestamp columns. A key submitted twice keeps its last extras.
    pub(super) fn sync_pivot(
        &self,
        run: &mut Run<'_, '_>,
        parent: &Record,
        field: &str,
        relation: &BelongsToMany,
        value: &Value,
    ) -> SyncResult<()> {
        let parent_key = parent.key().ok_or_else(|| {
            SyncError::invalid_operation(format!(
                "{} must be persisted before its {} relation can be synced",
                parent.entity_type(),
                relation.related
            ))
        })?;
        let related = self.schema.get(&relation.related)?;

        let mut entries: Vec<PivotEntry> = Vec::new();
        for item in RelationKind::ManyToMany.items_of(field, value)? {
            let Some(key) = item_key(item, related.key_name()) else {
                continue;
            };
            let entry = PivotEntry::new(key.clone()).with_attributes(self.pivot_extras(relation, item));
            match entries.iter_mut().find(|e| e.related == key) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        let changes = self.store.sync_pivot(&relation.pivot, &parent_key, &entries)?;
        debug!(
            entity_type = parent.entity_type(),
            relation = field,
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            updated = changes.updated.len(),
            "reconciled pivot"
        );
        run.report.attached += changes.attached.len();
        run.report.detached += changes.detached.len();
        run.report.pivot_updated += changes.updated.len();
        Ok(())
    }

    fn pivot_extras(&self, relation: &BelongsToMany, item: &Value) -> Map<String, Value> {
        let Some(extras) = item
            .as_object()
            .and_then(|node| node.get(&self.config.pivot_field))
            .and_then(Value::as_object)
        else {
            return Map::new();
        };
        extras
            .iter()
            .filter(|(column, _)| {
                **column != relation.pivot.foreign_pivot_key
                    && **column != relation.pivot.related_pivot_key
                    && !self.config.pivot_ignored_columns.contains(*column)
            })
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }
}
