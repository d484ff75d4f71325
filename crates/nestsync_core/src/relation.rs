//! Relationship descriptors and their classification.
//!
//! Every entity type exposes a lookup from relation name to a [`Relation`]
//! value. The set of variants is closed: the engine pattern-matches over it
//! instead of inspecting types at runtime.

use crate::error::{SyncError, SyncResult};
use crate::key::Constraint;
use crate::record::Record;
use crate::schema::{MorphMap, Syncable};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cardinality/ownership category of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// The related row points back here; exactly one row expected.
    SingleOwned,
    /// The related rows point back here; any number expected.
    ManyOwned,
    /// Membership lives in a pivot table carrying both keys.
    ManyToMany,
    /// This entity holds a foreign key to one parent row.
    BelongsTo,
    /// This entity holds a foreign key plus a type discriminator.
    MorphTo,
}

impl RelationKind {
    /// Owned relations (one-to-one and one-to-many).
    pub fn is_owned(self) -> bool {
        matches!(self, RelationKind::SingleOwned | RelationKind::ManyOwned)
    }

    /// Relations where this entity holds the foreign key.
    pub fn is_belongs_to(self) -> bool {
        matches!(self, RelationKind::BelongsTo | RelationKind::MorphTo)
    }

    /// Relations whose submitted value is a single node rather than a sequence.
    pub fn is_single(self) -> bool {
        matches!(
            self,
            RelationKind::SingleOwned | RelationKind::BelongsTo | RelationKind::MorphTo
        )
    }

    /// Relations whose submitted value is a sequence of nodes.
    pub fn is_many(self) -> bool {
        !self.is_single()
    }

    /// Normalises a value submitted under `field` to its items.
    ///
    /// Null is no items and a single node is one item. A sequence submitted
    /// for a single-valued relation may hold at most one item. Any other
    /// shape is [`SyncError::InvalidInput`].
    pub fn items_of<'v>(self, field: &str, value: &'v Value) -> SyncResult<Vec<&'v Value>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Object(_) => Ok(vec![value]),
            Value::Array(items) if self.is_many() || items.len() <= 1 => {
                Ok(items.iter().collect())
            }
            Value::Array(items) => Err(SyncError::invalid_input(format!(
                "{field} takes a single node, got a sequence of {}",
                items.len()
            ))),
            _ => Err(SyncError::invalid_input(format!(
                "{field} must be a node or a sequence of nodes"
            ))),
        }
    }
}

/// An owned (has-one / has-many) relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasOneOrMany {
    /// Related entity type.
    pub related: String,
    /// Column on the related row pointing back at the parent.
    pub foreign_key: String,
    /// Parent column the foreign key refers to; the parent key when `None`.
    pub local_key: Option<String>,
    /// Column on the related row holding the parent's morph alias, for
    /// polymorphic ownership (morph-one / morph-many).
    pub morph_type: Option<String>,
}

impl HasOneOrMany {
    /// Sets the parent column the foreign key refers to.
    #[must_use]
    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = Some(local_key.into());
        self
    }
}

/// A belongs-to relation: this entity holds the foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BelongsTo {
    /// Parent entity type.
    pub related: String,
    /// Column on this entity.
    pub foreign_key: String,
    /// Parent column referenced; the parent key when `None`.
    pub owner_key: Option<String>,
}

/// Pivot table description for many-to-many relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pivot {
    /// Pivot table name.
    pub table: String,
    /// Pivot column holding this entity's key.
    pub foreign_pivot_key: String,
    /// Pivot column holding the related entity's key.
    pub related_pivot_key: String,
}

/// A many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BelongsToMany {
    /// Related entity type.
    pub related: String,
    /// The pivot table.
    pub pivot: Pivot,
}

/// A polymorphic belongs-to relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphTo {
    /// Column on this entity holding the parent key.
    pub id_column: String,
    /// Column on this entity holding the parent's type alias.
    pub type_column: String,
}

/// A relationship descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// One related row points back here.
    HasOne(HasOneOrMany),
    /// Many related rows point back here.
    HasMany(HasOneOrMany),
    /// Rows linked through a pivot table.
    BelongsToMany(BelongsToMany),
    /// This entity references one parent row.
    BelongsTo(BelongsTo),
    /// This entity references one parent row of a runtime-chosen type.
    MorphTo(MorphTo),
}

impl Relation {
    /// `related` rows carry `foreign_key` pointing here; at most one.
    pub fn has_one(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasOne(owned(related.into(), foreign_key.into(), None))
    }

    /// `related` rows carry `foreign_key` pointing here.
    pub fn has_many(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasMany(owned(related.into(), foreign_key.into(), None))
    }

    /// Polymorphic has-one: `related` rows carry `<name>_id` and `<name>_type`.
    pub fn morph_one(related: impl Into<String>, name: &str) -> Self {
        Relation::HasOne(owned(
            related.into(),
            format!("{name}_id"),
            Some(format!("{name}_type")),
        ))
    }

    /// Polymorphic has-many: `related` rows carry `<name>_id` and `<name>_type`.
    pub fn morph_many(related: impl Into<String>, name: &str) -> Self {
        Relation::HasMany(owned(
            related.into(),
            format!("{name}_id"),
            Some(format!("{name}_type")),
        ))
    }

    /// This entity's `foreign_key` references a `related` row.
    pub fn belongs_to(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::BelongsTo(BelongsTo {
            related: related.into(),
            foreign_key: foreign_key.into(),
            owner_key: None,
        })
    }

    /// Rows of `related` linked through `table`.
    pub fn belongs_to_many(
        related: impl Into<String>,
        table: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Relation::BelongsToMany(BelongsToMany {
            related: related.into(),
            pivot: Pivot {
                table: table.into(),
                foreign_pivot_key: foreign_pivot_key.into(),
                related_pivot_key: related_pivot_key.into(),
            },
        })
    }

    /// This entity's `<name>_id` / `<name>_type` reference a row of any type.
    pub fn morph_to(name: &str) -> Self {
        Relation::MorphTo(MorphTo {
            id_column: format!("{name}_id"),
            type_column: format!("{name}_type"),
        })
    }

    /// Classifies the relation.
    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::HasOne(_) => RelationKind::SingleOwned,
            Relation::HasMany(_) => RelationKind::ManyOwned,
            Relation::BelongsToMany(_) => RelationKind::ManyToMany,
            Relation::BelongsTo(_) => RelationKind::BelongsTo,
            Relation::MorphTo(_) => RelationKind::MorphTo,
        }
    }

    /// The related entity type; `None` for polymorphic belongs-to, whose
    /// target is only known per item.
    pub fn related(&self) -> Option<&str> {
        match self {
            Relation::HasOne(r) | Relation::HasMany(r) => Some(&r.related),
            Relation::BelongsToMany(r) => Some(&r.related),
            Relation::BelongsTo(r) => Some(&r.related),
            Relation::MorphTo(_) => None,
        }
    }

    /// Binds the descriptor to one parent record.
    pub fn bind<'r>(&'r self, parent: &Record, morph_map: &MorphMap) -> BoundRelation<'r> {
        let local_value = match self {
            Relation::HasOne(r) | Relation::HasMany(r) => {
                let column = r.local_key.as_deref().unwrap_or(parent.key_name());
                parent.get(column).cloned().filter(|v| !v.is_null())
            }
            _ => parent.key().map(|k| k.to_value()),
        };
        BoundRelation {
            relation: self,
            parent_type: parent.entity_type().to_string(),
            local_value,
            parent_alias: morph_map.alias_for(parent.entity_type()).to_string(),
        }
    }
}

fn owned(related: String, foreign_key: String, morph_type: Option<String>) -> HasOneOrMany {
    HasOneOrMany {
        related,
        foreign_key,
        local_key: None,
        morph_type,
    }
}

/// A relation bound to one parent instance.
///
/// Carries whatever the relation needs from the parent to scope queries:
/// the parent's local key value and, for polymorphic ownership, its alias.
#[derive(Debug, Clone)]
pub struct BoundRelation<'r> {
    relation: &'r Relation,
    parent_type: String,
    local_value: Option<Value>,
    parent_alias: String,
}

impl<'r> BoundRelation<'r> {
    /// The underlying descriptor.
    pub fn relation(&self) -> &'r Relation {
        self.relation
    }

    /// Classifies the underlying descriptor.
    pub fn kind(&self) -> RelationKind {
        self.relation.kind()
    }

    /// The parent's value for the relation's local key.
    pub fn local_value(&self) -> Option<&Value> {
        self.local_value.as_ref()
    }

    /// Filters identifying rows attached to the parent.
    ///
    /// Only owned relations are scoped; other kinds return no constraints.
    pub fn constraints(&self) -> SyncResult<Vec<Constraint>> {
        let (Relation::HasOne(r) | Relation::HasMany(r)) = self.relation else {
            return Ok(Vec::new());
        };
        let value = self.local_value.clone().ok_or_else(|| {
            SyncError::invalid_operation(format!(
                "{} must be persisted before its {} relation can be synced",
                self.parent_type, r.related
            ))
        })?;

        let mut constraints = vec![Constraint::new(r.foreign_key.clone(), value)];
        if let Some(type_column) = &r.morph_type {
            constraints.push(Constraint::new(type_column.clone(), self.parent_alias.clone()));
        }
        Ok(constraints)
    }

    /// Builds a new, unsaved related record attached to the parent.
    pub fn make(&self, related: &dyn Syncable) -> SyncResult<Record> {
        let mut record = Record::new(related.entity_type(), related.key_name());
        for constraint in self.constraints()? {
            record.set(constraint.column, constraint.value);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn saved(entity_type: &str, attrs: Value) -> Record {
        let attrs: Map<String, Value> = attrs.as_object().cloned().unwrap();
        Record::from_storage(entity_type, "id", attrs)
    }

    #[test]
    fn classification() {
        assert_eq!(Relation::has_one("meta", "post_id").kind(), RelationKind::SingleOwned);
        assert_eq!(Relation::has_many("comments", "post_id").kind(), RelationKind::ManyOwned);
        assert_eq!(Relation::morph_many("images", "imageable").kind(), RelationKind::ManyOwned);
        assert_eq!(
            Relation::belongs_to_many("tags", "post_tag", "post_id", "tag_id").kind(),
            RelationKind::ManyToMany
        );
        assert_eq!(Relation::belongs_to("users", "author_id").kind(), RelationKind::BelongsTo);
        assert_eq!(Relation::morph_to("imageable").kind(), RelationKind::MorphTo);
    }

    #[test]
    fn kind_predicates() {
        assert!(RelationKind::SingleOwned.is_owned());
        assert!(RelationKind::SingleOwned.is_single());
        assert!(RelationKind::ManyOwned.is_many());
        assert!(RelationKind::ManyToMany.is_many());
        assert!(!RelationKind::ManyToMany.is_owned());
        assert!(RelationKind::MorphTo.is_belongs_to());
        assert!(RelationKind::BelongsTo.is_single());
    }

    #[test]
    fn submitted_items() {
        let single = json!({"id": 1});
        assert_eq!(RelationKind::ManyOwned.items_of("comments", &single).unwrap(), vec![&single]);
        assert!(RelationKind::ManyOwned.items_of("comments", &Value::Null).unwrap().is_empty());

        let one = json!([{"summary": 5}]);
        assert_eq!(RelationKind::SingleOwned.items_of("meta", &one).unwrap().len(), 1);
        let two = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(RelationKind::ManyToMany.items_of("tags", &two).unwrap().len(), 2);
        assert!(matches!(
            RelationKind::SingleOwned.items_of("meta", &two),
            Err(SyncError::InvalidInput { .. })
        ));
        assert!(matches!(
            RelationKind::ManyOwned.items_of("comments", &json!("nope")),
            Err(SyncError::InvalidInput { .. })
        ));
    }

    #[test]
    fn morph_columns() {
        let Relation::MorphTo(morph) = Relation::morph_to("imageable") else {
            panic!("expected morph-to");
        };
        assert_eq!(morph.id_column, "imageable_id");
        assert_eq!(morph.type_column, "imageable_type");
        assert_eq!(Relation::morph_to("imageable").related(), None);
    }

    #[test]
    fn bound_constraints_scope_to_parent() {
        let mut morph_map = MorphMap::new();
        morph_map.insert("post", "posts");
        let post = saved("posts", json!({"id": 4}));

        let comments = Relation::has_many("comments", "post_id");
        let bound = comments.bind(&post, &morph_map);
        assert_eq!(bound.constraints().unwrap(), vec![Constraint::new("post_id", 4)]);

        let images = Relation::morph_many("images", "imageable");
        let bound = images.bind(&post, &morph_map);
        assert_eq!(
            bound.constraints().unwrap(),
            vec![
                Constraint::new("imageable_id", 4),
                Constraint::new("imageable_type", "post"),
            ]
        );
    }

    #[test]
    fn unsaved_parent_cannot_scope() {
        let post = Record::new("posts", "id");
        let comments = Relation::has_many("comments", "post_id");
        let bound = comments.bind(&post, &MorphMap::new());
        assert!(matches!(
            bound.constraints(),
            Err(SyncError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn local_key_override() {
        let post = saved("posts", json!({"id": 4, "uuid": "p-1"}));
        let relation = Relation::HasMany(
            HasOneOrMany {
                related: "comments".into(),
                foreign_key: "post_uuid".into(),
                local_key: None,
                morph_type: None,
            }
            .with_local_key("uuid"),
        );
        let bound = relation.bind(&post, &MorphMap::new());
        assert_eq!(bound.local_value(), Some(&json!("p-1")));
    }
}
