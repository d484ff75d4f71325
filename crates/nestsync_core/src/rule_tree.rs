//! Validation rules mirroring the shape of a submitted tree.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::path_tree::PathTree;
use crate::record::DataNode;
use crate::relation::Relation;
use crate::rules::{Rule, RuleSet};
use crate::schema::{Schema, Syncable};
use serde_json::Value;

/// Builds the rule set for one node of type `syncable` and everything below
/// it in `tree`.
///
/// Starts from the type's own rules. Owned relations present in `data` nest
/// the related type's rules under `<field>.*` (plural) or `<field>`
/// (singular), using the first submitted item as the representative
/// shape. A single node submitted for a plural relation counts as one item. Belongs-to relations add an `exists` rule on the related key.
/// Many-to-many and polymorphic belongs-to relations add nothing.
///
/// References inside the returned set are still relative to their declaring
/// node; see [`complete_rules`].
pub fn generate_rules(
    schema: &Schema,
    config: &SyncConfig,
    syncable: &dyn Syncable,
    tree: &PathTree,
    data: &DataNode,
) -> SyncResult<RuleSet> {
    let mut rules = syncable.sync_rules();

    for (name, node) in tree.iter() {
        let relation = syncable
            .relation(name)
            .ok_or_else(|| SyncError::unknown_relation(syncable.entity_type(), name))?;
        let field = config.field_name(name);
        let Some(value) = data.get(&field) else {
            continue;
        };

        match &relation {
            Relation::HasOne(r) | Relation::HasMany(r) => {
                let related = schema.get(&r.related)?;
                let many = relation.kind().is_many();
                let sample = representative(relation.kind().items_of(&field, value)?);
                let sub = generate_rules(schema, config, related, &node.children(), &sample)?;
                let prefix = if many { format!("{field}.*") } else { field };
                rules.nest(&prefix, sub);
            }
            Relation::BelongsTo(r) => {
                let related = schema.get(&r.related)?;
                rules.push(
                    format!("{field}.{}", related.key_name()),
                    Rule::exists(related.entity_type(), related.key_name()),
                );
            }
            Relation::BelongsToMany(_) | Relation::MorphTo(_) => {}
        }
    }

    Ok(rules)
}

/// Rules for a whole tree, with every field reference rewritten to address
/// the data root.
pub fn complete_rules(
    schema: &Schema,
    config: &SyncConfig,
    syncable: &dyn Syncable,
    tree: &PathTree,
    data: &DataNode,
) -> SyncResult<RuleSet> {
    Ok(generate_rules(schema, config, syncable, tree, data)?.into_relative())
}

fn representative(items: Vec<&Value>) -> DataNode {
    items
        .first()
        .and_then(|item| item.as_object())
        .cloned()
        .unwrap_or_default()
}
