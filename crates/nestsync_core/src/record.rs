//! Entity records.

use crate::key::Key;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One submitted data node: attributes plus nested relation nodes.
pub type DataNode = Map<String, Value>;

/// A persisted or transient entity.
///
/// `exists` is true once the record has been loaded from or written to
/// storage. The `original` snapshot tracks what storage last saw, so a save
/// of an unchanged record can be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity_type: String,
    key_name: String,
    attributes: Map<String, Value>,
    original: Map<String, Value>,
    exists: bool,
    relations: BTreeMap<String, Loaded>,
}

/// A cached in-memory copy of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// A singular relation (possibly empty).
    One(Option<Box<Record>>),
    /// A plural relation.
    Many(Vec<Record>),
}

impl Record {
    /// Creates a new transient record.
    pub fn new(entity_type: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_name: key_name.into(),
            attributes: Map::new(),
            original: Map::new(),
            exists: false,
            relations: BTreeMap::new(),
        }
    }

    /// Creates a record as loaded from storage.
    pub fn from_storage(
        entity_type: impl Into<String>,
        key_name: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_name: key_name.into(),
            original: attributes.clone(),
            attributes,
            exists: true,
            relations: BTreeMap::new(),
        }
    }

    /// Entity type (table) name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Primary-key column name.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Primary-key value, if set.
    pub fn key(&self) -> Option<Key> {
        Key::from_field(&self.attributes, &self.key_name)
    }

    /// Sets the primary-key value.
    pub fn set_key(&mut self, key: &Key) {
        let name = self.key_name.clone();
        self.attributes.insert(name, key.to_value());
    }

    /// Whether the record exists in storage.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Reads an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Writes an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// All attributes.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Assigns every field of `data` for which `accept` returns true.
    ///
    /// The key column is never mass-assigned.
    pub fn fill_with(&mut self, data: &DataNode, accept: impl Fn(&str) -> bool) -> &mut Self {
        for (name, value) in data {
            if name != &self.key_name && accept(name) {
                self.attributes.insert(name.clone(), value.clone());
            }
        }
        self
    }

    /// Assigns every field of `data` except the key column.
    pub fn fill(&mut self, data: &DataNode) -> &mut Self {
        self.fill_with(data, |_| true)
    }

    /// Returns true if attributes differ from what storage last saw.
    pub fn is_dirty(&self) -> bool {
        !self.exists || self.attributes != self.original
    }

    /// Names of attributes changed since the last save.
    pub fn dirty(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Marks the record as written: it exists and is clean.
    pub fn finish_save(&mut self) {
        self.exists = true;
        self.original = self.attributes.clone();
    }

    /// Caches a loaded relation.
    pub fn set_relation(&mut self, name: impl Into<String>, loaded: Loaded) {
        self.relations.insert(name.into(), loaded);
    }

    /// Returns the cached relation, if loaded.
    pub fn relation(&self, name: &str) -> Option<&Loaded> {
        self.relations.get(name)
    }

    /// Returns true if the relation is cached.
    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Drops the cached copy of a relation.
    pub fn unset_relation(&mut self, name: &str) {
        self.relations.remove(name);
    }
}
