//! Entity type declarations.
//!
//! The engine depends only on the [`Syncable`] capability interface. Most
//! types are declared with [`EntityDef`]; types that need custom hooks can
//! implement the trait directly.

use crate::error::{SyncError, SyncResult};
use crate::record::{DataNode, Record};
use crate::relation::Relation;
use crate::rules::{Rule, RuleSet};
use crate::validation::Messages;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The capability interface every synchronizable entity type provides.
pub trait Syncable: Send + Sync {
    /// Entity type (table) name.
    fn entity_type(&self) -> &str;

    /// Primary-key column name.
    fn key_name(&self) -> &str {
        "id"
    }

    /// Looks up a declared relation by name.
    ///
    /// Called fresh for every use; implementations must not assume the
    /// descriptor is cached.
    fn relation(&self, name: &str) -> Option<Relation>;

    /// Names of every declared relation.
    fn relation_names(&self) -> Vec<String>;

    /// Relationship dot paths synchronized by default.
    fn syncable(&self) -> Vec<String> {
        Vec::new()
    }

    /// Attributes open to mass assignment; everything when `None`.
    fn fillable(&self) -> Option<Vec<String>> {
        None
    }

    /// The type's own validation rules, keyed relative to its node.
    fn sync_rules(&self) -> RuleSet {
        RuleSet::new()
    }

    /// Custom validation messages.
    fn sync_messages(&self) -> Messages {
        Messages::new()
    }

    /// Attribute receiving descending submission-order ranks.
    fn order_attribute(&self) -> Option<&str> {
        None
    }

    /// Transforms a data node before it is applied.
    fn before_sync(&self, data: DataNode) -> DataNode {
        data
    }

    /// Runs after the record for `data` has been saved.
    fn after_sync(&self, _record: &mut Record, _data: &DataNode) -> SyncResult<()> {
        Ok(())
    }
}

type BeforeSyncFn = Arc<dyn Fn(DataNode) -> DataNode + Send + Sync>;
type AfterSyncFn = Arc<dyn Fn(&mut Record, &DataNode) -> SyncResult<()> + Send + Sync>;

/// Declarative [`Syncable`] implementation.
#[derive(Clone)]
pub struct EntityDef {
    entity_type: String,
    key_name: String,
    relations: BTreeMap<String, Relation>,
    syncable: Vec<String>,
    fillable: Option<Vec<String>>,
    rules: RuleSet,
    messages: Messages,
    order_attribute: Option<String>,
    before_sync: Option<BeforeSyncFn>,
    after_sync: Option<AfterSyncFn>,
}

impl EntityDef {
    /// Declares an entity type with an `id` key column.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_name: "id".to_string(),
            relations: BTreeMap::new(),
            syncable: Vec::new(),
            fillable: None,
            rules: RuleSet::new(),
            messages: Messages::new(),
            order_attribute: None,
            before_sync: None,
            after_sync: None,
        }
    }

    /// Sets the key column.
    #[must_use]
    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// Declares a relation.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Sets the default syncable dot paths.
    #[must_use]
    pub fn syncable<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.syncable = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts mass assignment to the given attributes.
    #[must_use]
    pub fn fillable<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Adds rules for a field of this node.
    #[must_use]
    pub fn rule(mut self, field: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(field, rules);
        self
    }

    /// Sets custom validation messages.
    #[must_use]
    pub fn messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Sets the ordering attribute.
    #[must_use]
    pub fn order_by(mut self, attribute: impl Into<String>) -> Self {
        self.order_attribute = Some(attribute.into());
        self
    }

    /// Installs a `before_sync` transform.
    #[must_use]
    pub fn on_before_sync(mut self, f: impl Fn(DataNode) -> DataNode + Send + Sync + 'static) -> Self {
        self.before_sync = Some(Arc::new(f));
        self
    }

    /// Installs an `after_sync` callback.
    #[must_use]
    pub fn on_after_sync(
        mut self,
        f: impl Fn(&mut Record, &DataNode) -> SyncResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_sync = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("entity_type", &self.entity_type)
            .field("key_name", &self.key_name)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("syncable", &self.syncable)
            .field("order_attribute", &self.order_attribute)
            .finish_non_exhaustive()
    }
}

impl Syncable for EntityDef {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn key_name(&self) -> &str {
        &self.key_name
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        self.relations.get(name).cloned()
    }

    fn relation_names(&self) -> Vec<String> {
        self.relations.keys().cloned().collect()
    }

    fn syncable(&self) -> Vec<String> {
        self.syncable.clone()
    }

    fn fillable(&self) -> Option<Vec<String>> {
        self.fillable.clone()
    }

    fn sync_rules(&self) -> RuleSet {
        self.rules.clone()
    }

    fn sync_messages(&self) -> Messages {
        self.messages.clone()
    }

    fn order_attribute(&self) -> Option<&str> {
        self.order_attribute.as_deref()
    }

    fn before_sync(&self, data: DataNode) -> DataNode {
        match &self.before_sync {
            Some(f) => f(data),
            None => data,
        }
    }

    fn after_sync(&self, record: &mut Record, data: &DataNode) -> SyncResult<()> {
        match &self.after_sync {
            Some(f) => f(record, data),
            None => Ok(()),
        }
    }
}

/// Alias table for polymorphic relations.
///
/// Maps short aliases (`"post"`) to entity types (`"posts"`) and back.
/// Types without an alias are stored under their own name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MorphMap {
    by_alias: BTreeMap<String, String>,
    by_type: BTreeMap<String, String>,
}

impl MorphMap {
    /// Creates an empty alias table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `alias` for `entity_type`.
    pub fn insert(&mut self, alias: impl Into<String>, entity_type: impl Into<String>) {
        let (alias, entity_type) = (alias.into(), entity_type.into());
        self.by_type.insert(entity_type.clone(), alias.clone());
        self.by_alias.insert(alias, entity_type);
    }

    /// The entity type registered for `alias`.
    pub fn entity_type_for(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(String::as_str)
    }

    /// The alias stored for `entity_type`; the type name itself if none.
    pub fn alias_for<'a>(&'a self, entity_type: &'a str) -> &'a str {
        self.by_type
            .get(entity_type)
            .map(String::as_str)
            .unwrap_or(entity_type)
    }
}

/// Registry of entity types.
#[derive(Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, Arc<dyn Syncable>>,
    morph_map: MorphMap,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type, returning the schema.
    #[must_use]
    pub fn with(mut self, syncable: impl Syncable + 'static) -> Self {
        self.register(syncable);
        self
    }

    /// Registers a polymorphic alias, returning the schema.
    #[must_use]
    pub fn with_morph(mut self, alias: impl Into<String>, entity_type: impl Into<String>) -> Self {
        self.morph_map.insert(alias, entity_type);
        self
    }

    /// Registers an entity type.
    pub fn register(&mut self, syncable: impl Syncable + 'static) {
        self.types
            .insert(syncable.entity_type().to_string(), Arc::new(syncable));
    }

    /// Looks up an entity type.
    pub fn get(&self, entity_type: &str) -> SyncResult<&dyn Syncable> {
        self.types
            .get(entity_type)
            .map(|s| s.as_ref())
            .ok_or_else(|| SyncError::unknown_entity_type(entity_type))
    }

    /// Returns true if the entity type is registered.
    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    /// The polymorphic alias table.
    pub fn morph_map(&self) -> &MorphMap {
        &self.morph_map
    }

    /// Resolves a polymorphic discriminator (alias or type name).
    pub fn resolve_morph(&self, discriminator: &str) -> SyncResult<&dyn Syncable> {
        let entity_type = self
            .morph_map
            .entity_type_for(discriminator)
            .unwrap_or(discriminator);
        if !self.contains(entity_type) {
            return Err(SyncError::invalid_input(format!(
                "cannot determine target type: unknown type {discriminator:?}"
            )));
        }
        self.get(entity_type)
    }

    /// Creates a new transient record of `entity_type`.
    pub fn new_record(&self, entity_type: &str) -> SyncResult<Record> {
        let syncable = self.get(entity_type)?;
        Ok(Record::new(syncable.entity_type(), syncable.key_name()))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("morph_map", &self.morph_map)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .with(
                EntityDef::new("posts")
                    .relation("comments", Relation::has_many("comments", "post_id"))
                    .syncable(["comments"]),
            )
            .with(EntityDef::new("comments").key_name("uuid").order_by("position"))
            .with_morph("post", "posts")
    }

    #[test]
    fn lookup_registered_types() {
        let schema = schema();
        let posts = schema.get("posts").unwrap();
        assert_eq!(posts.key_name(), "id");
        assert_eq!(posts.syncable(), vec!["comments"]);
        assert_eq!(posts.relation_names(), vec!["comments"]);
        assert!(posts.relation("likes").is_none());

        let comments = schema.get("comments").unwrap();
        assert_eq!(comments.key_name(), "uuid");
        assert_eq!(comments.order_attribute(), Some("position"));

        assert!(matches!(
            schema.get("likes"),
            Err(SyncError::UnknownEntityType { .. })
        ));
    }

    #[test]
    fn morph_resolution() {
        let schema = schema();
        assert_eq!(schema.resolve_morph("post").unwrap().entity_type(), "posts");
        assert_eq!(schema.resolve_morph("comments").unwrap().entity_type(), "comments");
        assert!(matches!(
            schema.resolve_morph("video"),
            Err(SyncError::InvalidInput { .. })
        ));

        assert_eq!(schema.morph_map().alias_for("posts"), "post");
        assert_eq!(schema.morph_map().alias_for("comments"), "comments");
    }

    #[test]
    fn closure_hooks() {
        let def = EntityDef::new("posts")
            .on_before_sync(|mut data| {
                data.insert("slug".into(), json!("hello"));
                data
            })
            .on_after_sync(|record, _| {
                record.set("synced", true);
                Ok(())
            });

        let data = def.before_sync(DataNode::new());
        assert_eq!(data.get("slug"), Some(&json!("hello")));

        let mut record = Record::new("posts", "id");
        def.after_sync(&mut record, &data).unwrap();
        assert_eq!(record.get("synced"), Some(&json!(true)));
    }

    #[test]
    fn new_record_uses_key_name() {
        let record = schema().new_record("comments").unwrap();
        assert_eq!(record.key_name(), "uuid");
        assert!(!record.exists());
    }
}
