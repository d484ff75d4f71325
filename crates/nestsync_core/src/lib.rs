//! # nestsync Core
//!
//! Nested relationship synchronization engine.
//!
//! Given an entity, a list of dot-separated relationship paths and a nested
//! data tree submitted by a client, the engine validates the whole tree and
//! then creates, updates, associates, dissociates and deletes rows so that
//! storage matches it.
//!
//! This crate provides:
//! - Path trees built from dot paths (`"comments.author"`)
//! - A closed set of relationship descriptors and their classification
//! - Rule generation mirroring the submitted tree
//! - Existence annotation of submitted nodes
//! - The [`SyncEngine`] orchestrating the whole call
//!
//! Storage and rule evaluation are collaborators behind the [`Store`] and
//! [`Validator`] traits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nestsync_core::{EntityDef, Record, Relation, Schema, SyncEngine};
//!
//! let schema = Schema::new()
//!     .with(
//!         EntityDef::new("posts")
//!             .relation("comments", Relation::has_many("comments", "post_id"))
//!             .syncable(["comments"]),
//!     )
//!     .with(EntityDef::new("comments").order_by("position"));
//!
//! let engine = SyncEngine::new(&schema, &store).with_validator(&validator);
//! let mut post = Record::new("posts", "id");
//! engine.save_and_sync(&mut post, &data)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod annotate;
mod config;
mod error;
mod key;
mod path_tree;
mod record;
mod relation;
mod resolver;
mod rule_tree;
mod rules;
mod schema;
mod store;
mod sync;
mod validation;

pub use annotate::{annotate, ExistsHint};
pub use config::{snake_case, FieldNaming, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use key::{loose_eq, matches_all, Constraint, Key};
pub use path_tree::{IntoPathTree, PathNode, PathTree};
pub use record::{DataNode, Loaded, Record};
pub use relation::{
    BelongsTo, BelongsToMany, BoundRelation, HasOneOrMany, MorphTo, Pivot, Relation, RelationKind,
};
pub use resolver::{item_key, related_type, RelatedResolver};
pub use rule_tree::{complete_rules, generate_rules};
pub use rules::{Rule, RuleSet};
pub use schema::{EntityDef, MorphMap, Schema, Syncable};
pub use store::{PivotChanges, PivotEntry, Store};
pub use sync::{SyncEngine, SyncHooks, SyncOutcome, SyncReport};
pub use validation::{FieldError, Messages, ValidationErrors, Validator};
