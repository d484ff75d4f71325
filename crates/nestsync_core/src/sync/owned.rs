//! One-to-one and one-to-many reconciliation.

use super::{Run, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::key::Key;
use crate::path_tree::PathTree;
use crate::record::Record;
use crate::relation::Relation;
use crate::resolver::item_key;
use crate::store::Store;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

impl<S: Store + ?Sized> SyncEngine<'_, S> {
    /// Upserts every submitted child of an owned relation and deletes the
    /// attached rows that were not submitted.
    ///
    /// A single node is treated as a one-element sequence and null as an
    /// empty one. A single-valued relation rejects a sequence of several.
    pub(super) fn sync_owned(
        &self,
        run: &mut Run<'_, '_>,
        parent: &mut Record,
        field: &str,
        relation: &Relation,
        value: &Value,
        children: &PathTree,
    ) -> SyncResult<()> {
        let (Relation::HasOne(owned) | Relation::HasMany(owned)) = relation else {
            return Ok(());
        };
        let related = self.schema.get(&owned.related)?;
        let items = relation.kind().items_of(field, value)?;

        let bound = relation.bind(parent, self.schema.morph_map());
        let constraints = bound.constraints()?;

        let submitted: BTreeSet<Key> = items
            .iter()
            .filter_map(|item| item_key(item, related.key_name()))
            .collect();
        let orphans: Vec<Key> = self
            .store
            .keys_where(related.entity_type(), &constraints)?
            .into_iter()
            .filter(|key| !submitted.contains(key))
            .collect();

        debug!(
            entity_type = parent.entity_type(),
            relation = field,
            kind = ?relation.kind(),
            items = items.len(),
            orphans = orphans.len(),
            "syncing owned relation"
        );

        let resolver = self.resolver();
        let count = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let node = item.as_object().ok_or_else(|| {
                SyncError::invalid_input(format!("items of {field} must be mappings"))
            })?;
            let node = related.before_sync(node.clone());
            let node = run.hooks.before_sync(related.entity_type(), node);

            let mut child = match resolver.resolve(&bound, &Value::Object(node.clone()))? {
                Some(found) => found,
                None => bound.make(related)?,
            };
            self.fill(related, &mut child, &node);
            // Submitted data never moves a child to another parent.
            for constraint in &constraints {
                child.set(constraint.column.clone(), constraint.value.clone());
            }
            if let Some(attribute) = related.order_attribute() {
                child.set(attribute, (count - index) as u64);
            }

            self.associate_all(run, related, &mut child, children.names(), &node)?;
            self.save(run, &mut child)?;
            related.after_sync(&mut child, &node)?;
            run.hooks.after_sync(&child, &node);

            if !children.is_empty() {
                self.sync_tree(run, related, &mut child, children, &node)?;
            }
        }

        for key in orphans {
            let Some(orphan) = self
                .store
                .find(related.entity_type(), related.key_name(), &key)?
            else {
                continue;
            };
            debug!(entity_type = related.entity_type(), %key, "deleting orphan");
            self.store.delete(&orphan)?;
            run.report.deleted += 1;
        }

        Ok(())
    }
}
