//! Related entity resolution.
//!
//! Given a bound relation and one submitted item, find the persisted row the
//! item refers to. A missing key or a failed lookup is not an error: it
//! tells the caller to create (owned relations) or dissociate (belongs-to).

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::key::{matches_all, Key};
use crate::record::Record;
use crate::relation::{BoundRelation, Relation};
use crate::schema::{Schema, Syncable};
use crate::store::Store;
use serde_json::Value;
use tracing::trace;

/// Locates existing related entities by primary key.
pub struct RelatedResolver<'a, S: Store + ?Sized> {
    schema: &'a Schema,
    store: &'a S,
    config: &'a SyncConfig,
}

impl<'a, S: Store + ?Sized> RelatedResolver<'a, S> {
    /// Creates a resolver.
    pub fn new(schema: &'a Schema, store: &'a S, config: &'a SyncConfig) -> Self {
        Self {
            schema,
            store,
            config,
        }
    }

    /// Determines the entity type an item of `relation` refers to.
    ///
    /// Polymorphic items must carry a discriminator, read from the
    /// configured type field or, failing that, the relation's type column.
    pub fn target_type(&self, relation: &Relation, item: &Value) -> SyncResult<&'a dyn Syncable> {
        related_type(self.schema, self.config, relation, item)
    }

    /// Resolves `item` to a persisted record, or `None` to signal "create"
    /// or "dissociate".
    ///
    /// Owned relations only match rows already attached to the bound parent,
    /// so a key belonging to another parent resolves to `None`.
    pub fn resolve(&self, bound: &BoundRelation<'_>, item: &Value) -> SyncResult<Option<Record>> {
        if item.is_null() {
            return Ok(None);
        }
        let target = self.target_type(bound.relation(), item)?;
        let Some(key) = item_key(item, target.key_name()) else {
            trace!(entity_type = target.entity_type(), "item has no key");
            return Ok(None);
        };

        let Some(found) = self
            .store
            .find(target.entity_type(), target.key_name(), &key)?
        else {
            trace!(entity_type = target.entity_type(), %key, "no row for submitted key");
            return Ok(None);
        };

        if bound.kind().is_owned() && !matches_all(&bound.constraints()?, found.attributes()) {
            trace!(entity_type = target.entity_type(), %key, "row belongs to another parent");
            return Ok(None);
        }
        Ok(Some(found))
    }
}

/// Entity type of one item of `relation`, resolving polymorphic targets
/// through the schema's alias table.
pub fn related_type<'s>(
    schema: &'s Schema,
    config: &SyncConfig,
    relation: &Relation,
    item: &Value,
) -> SyncResult<&'s dyn Syncable> {
    match relation {
        Relation::MorphTo(morph) => {
            let discriminator = item
                .as_object()
                .and_then(|node| {
                    node.get(&config.morph_type_field)
                        .or_else(|| node.get(&morph.type_column))
                })
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| SyncError::invalid_input("cannot determine target type"))?;
            schema.resolve_morph(discriminator)
        }
        other => {
            // Every non-polymorphic variant names its related type.
            let related = other.related().unwrap_or_default();
            schema.get(related)
        }
    }
}

/// Reads the key of a submitted item: the key field of a node, or the value
/// itself when a bare key was submitted.
pub fn item_key(item: &Value, key_name: &str) -> Option<Key> {
    match item {
        Value::Object(node) => Key::from_field(node, key_name),
        other => Key::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_keys() {
        assert_eq!(item_key(&json!({"id": 3}), "id"), Some(Key::Int(3)));
        assert_eq!(item_key(&json!({"uuid": "a-b"}), "uuid"), Some(Key::from("a-b")));
        assert_eq!(item_key(&json!({"title": "x"}), "id"), None);
        assert_eq!(item_key(&json!(5), "id"), Some(Key::Int(5)));
        assert_eq!(item_key(&json!(null), "id"), None);
    }

    #[test]
    fn polymorphic_target_needs_discriminator() {
        use crate::schema::EntityDef;

        let schema = Schema::new()
            .with(EntityDef::new("posts"))
            .with(EntityDef::new("users"))
            .with_morph("post", "posts");
        let config = SyncConfig::default();
        let morph = Relation::morph_to("imageable");

        let target = related_type(&schema, &config, &morph, &json!({"type": "post", "id": 1})).unwrap();
        assert_eq!(target.entity_type(), "posts");

        let target =
            related_type(&schema, &config, &morph, &json!({"imageable_type": "users"})).unwrap();
        assert_eq!(target.entity_type(), "users");

        for item in [json!({"id": 1}), json!({"type": "video"}), json!(3)] {
            assert!(matches!(
                related_type(&schema, &config, &morph, &item),
                Err(SyncError::InvalidInput { .. })
            ));
        }

        let plain = Relation::belongs_to("users", "author_id");
        assert_eq!(
            related_type(&schema, &config, &plain, &json!(1)).unwrap().entity_type(),
            "users"
        );
    }
}
