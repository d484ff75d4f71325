//! Existence annotation of submitted trees.
//!
//! Rules and sync both distinguish create from update. Each node gets three
//! bookkeeping fields (names from [`SyncConfig`]): whether it exists, its
//! key and its key column name.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::key::Key;
use crate::path_tree::PathTree;
use crate::record::DataNode;
use crate::relation::Relation;
use crate::resolver::related_type;
use crate::schema::{Schema, Syncable};
use serde_json::Value;

/// Existence known from outside the data, used for the root node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsHint {
    /// Whether the node already exists in storage.
    pub exists: bool,
    /// Its key, if known.
    pub key: Option<Key>,
}

/// Returns a copy of `data` with bookkeeping fields on every node of `tree`.
///
/// Without a hint, a node exists exactly when it carries a non-empty key.
/// Children never inherit the parent's hint. Owned relation values come out
/// in their relation's shape: a sequence for plural relations and a single
/// node for singular ones.
pub fn annotate(
    schema: &Schema,
    config: &SyncConfig,
    syncable: &dyn Syncable,
    tree: &PathTree,
    data: &DataNode,
    hint: Option<ExistsHint>,
) -> SyncResult<DataNode> {
    let mut out = data.clone();
    let key_name = syncable.key_name();
    let (exists, key) = match hint {
        Some(hint) => {
            let key = hint.key.or_else(|| Key::from_field(data, key_name));
            (hint.exists, key)
        }
        None => {
            let key = Key::from_field(data, key_name);
            (key.is_some(), key)
        }
    };
    out.insert(config.exists_field.clone(), Value::Bool(exists));
    out.insert(
        config.key_field.clone(),
        key.map_or(Value::Null, |k| k.to_value()),
    );
    out.insert(config.key_name_field.clone(), Value::from(key_name));

    for (name, node) in tree.iter() {
        let relation = syncable
            .relation(name)
            .ok_or_else(|| SyncError::unknown_relation(syncable.entity_type(), name))?;
        let field = config.field_name(name);
        let children = node.children();
        let kind = relation.kind();

        if kind.is_owned() {
            let Some(value) = data.get(&field).filter(|v| !v.is_null()) else {
                continue;
            };
            let items = kind
                .items_of(&field, value)?
                .into_iter()
                .map(|item| annotate_item(schema, config, &relation, &children, item))
                .collect::<SyncResult<Vec<_>>>()?;
            let annotated = if kind.is_many() {
                Value::Array(items)
            } else {
                items.into_iter().next().unwrap_or(Value::Null)
            };
            out.insert(field, annotated);
            continue;
        }

        let Some(value) = data.get(&field).filter(|v| is_filled(v)) else {
            continue;
        };
        let annotated = match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| annotate_item(schema, config, &relation, &children, item))
                    .collect::<SyncResult<Vec<_>>>()?,
            ),
            single => annotate_item(schema, config, &relation, &children, single)?,
        };
        out.insert(field, annotated);
    }

    Ok(out)
}

fn annotate_item(
    schema: &Schema,
    config: &SyncConfig,
    relation: &Relation,
    tree: &PathTree,
    item: &Value,
) -> SyncResult<Value> {
    // Bare keys (many-to-many, belongs-to) carry nothing to annotate.
    let Some(node) = item.as_object() else {
        return Ok(item.clone());
    };
    let related = related_type(schema, config, relation, item)?;
    let annotated = annotate(schema, config, related, tree, node, None)?;
    Ok(Value::Object(annotated))
}

/// Truthiness of a submitted relation value: null, false, zero, `""`, `"0"`
/// and empty collections are all "not submitted".
pub(crate) fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
