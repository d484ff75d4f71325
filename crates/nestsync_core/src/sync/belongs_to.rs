//! Belongs-to association.

use super::{Run, SyncEngine};
use crate::error::SyncResult;
use crate::record::{Loaded, Record};
use crate::relation::Relation;
use crate::store::Store;
use serde_json::Value;
use tracing::debug;

impl<S: Store + ?Sized> SyncEngine<'_, S> {
    /// Points the foreign key of `record` at the parent `value` resolves to,
    /// or clears it when nothing resolves.
    ///
    /// The parent row itself is never modified.
    pub(super) fn sync_belongs_to_one(
        &self,
        run: &mut Run<'_, '_>,
        record: &mut Record,
        name: &str,
        relation: &Relation,
        value: &Value,
    ) -> SyncResult<()> {
        let bound = relation.bind(record, self.schema.morph_map());
        let found = self.resolver().resolve(&bound, value)?;

        match (relation, found) {
            (Relation::BelongsTo(belongs), Some(parent)) => {
                let owner_key = belongs.owner_key.as_deref().unwrap_or(parent.key_name());
                let target = parent.get(owner_key).cloned().unwrap_or(Value::Null);
                record.set(belongs.foreign_key.clone(), target);
                associated(run, record, name, parent);
            }
            (Relation::MorphTo(morph), Some(parent)) => {
                let target = parent.key().map_or(Value::Null, |k| k.to_value());
                let alias = self.schema.morph_map().alias_for(parent.entity_type());
                record.set(morph.id_column.clone(), target);
                record.set(morph.type_column.clone(), alias);
                associated(run, record, name, parent);
            }
            (Relation::BelongsTo(belongs), None) => {
                record.set(belongs.foreign_key.clone(), Value::Null);
                dissociated(run, record, name);
            }
            (Relation::MorphTo(morph), None) => {
                record.set(morph.id_column.clone(), Value::Null);
                record.set(morph.type_column.clone(), Value::Null);
                dissociated(run, record, name);
            }
            _ => {}
        }
        Ok(())
    }
}

fn associated(run: &mut Run<'_, '_>, record: &mut Record, name: &str, parent: Record) {
    debug!(
        entity_type = record.entity_type(),
        relation = name,
        parent = parent.entity_type(),
        "associated"
    );
    record.set_relation(name, Loaded::One(Some(Box::new(parent))));
    run.report.associated += 1;
}

fn dissociated(run: &mut Run<'_, '_>, record: &mut Record, name: &str) {
    debug!(entity_type = record.entity_type(), relation = name, "dissociated");
    record.set_relation(name, Loaded::One(None));
    run.report.dissociated += 1;
}
