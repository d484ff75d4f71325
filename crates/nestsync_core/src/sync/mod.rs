//! The sync engine.
//!
//! [`SyncEngine`] walks a path tree over a record and its submitted data:
//! belongs-to parents are associated before the owner is saved, owned
//! children are upserted after it (orphans deleted individually), and
//! many-to-many sets are reconciled through the pivot table.
//!
//! The engine never opens transactions. Wrap a call in the store's atomic
//! boundary to get all-or-nothing behaviour.

mod belongs_to;
mod hooks;
mod owned;
mod pivot;
mod report;

pub use hooks::SyncHooks;
pub use report::{SyncOutcome, SyncReport};

use crate::annotate::{annotate, ExistsHint};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::path_tree::{IntoPathTree, PathTree};
use crate::record::{DataNode, Record};
use crate::relation::Relation;
use crate::resolver::RelatedResolver;
use crate::rule_tree;
use crate::rules::RuleSet;
use crate::schema::{Schema, Syncable};
use crate::store::Store;
use crate::validation::Validator;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace, warn};

/// Per-call state: the caller's hooks and the running report.
struct Run<'k, 'h> {
    hooks: &'k mut SyncHooks<'h>,
    report: SyncReport,
}

/// Reconciles submitted trees against a [`Store`].
pub struct SyncEngine<'a, S: Store + ?Sized> {
    schema: &'a Schema,
    store: &'a S,
    validator: Option<&'a dyn Validator>,
    config: SyncConfig,
}

impl<'a, S: Store + ?Sized> SyncEngine<'a, S> {
    /// Creates an engine with the default configuration and no validator.
    pub fn new(schema: &'a Schema, store: &'a S) -> Self {
        Self {
            schema,
            store,
            validator: None,
            config: SyncConfig::default(),
        }
    }

    /// Sets the validation collaborator.
    #[must_use]
    pub fn with_validator(mut self, validator: &'a dyn Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The schema the engine resolves entity types in.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The default relationship paths of `entity_type`.
    pub fn default_paths(&self, entity_type: &str) -> SyncResult<PathTree> {
        Ok(PathTree::from_paths(self.schema.get(entity_type)?.syncable()))
    }

    /// Validates, saves and syncs `record` along its default syncable paths.
    pub fn save_and_sync(&self, record: &mut Record, data: &DataNode) -> SyncResult<SyncOutcome> {
        let paths = self.default_paths(record.entity_type())?;
        self.save_and_sync_with(record, data, paths, &mut SyncHooks::new())
    }

    /// Validates, saves and syncs `record` along `paths`.
    ///
    /// Order of work: validation (when enabled), the `on_syncing` veto, the
    /// type's `before_sync`, mass assignment, belongs-to association, the
    /// root save, every relation in `paths`, `on_synced`, and finally the
    /// type's `after_sync`.
    pub fn save_and_sync_with(
        &self,
        record: &mut Record,
        data: &DataNode,
        paths: impl IntoPathTree,
        hooks: &mut SyncHooks<'_>,
    ) -> SyncResult<SyncOutcome> {
        let syncable = self.schema.get(record.entity_type())?;
        let tree = paths.into_path_tree();

        if self.config.validate {
            self.validate_tree(syncable, record, &tree, data)?;
        }

        if hooks.syncing(record, data).is_break() {
            warn!(entity_type = record.entity_type(), "sync cancelled by hook");
            return Ok(SyncOutcome::Cancelled);
        }

        let mut run = Run {
            hooks,
            report: SyncReport::default(),
        };
        let data = syncable.before_sync(data.clone());
        let data = run.hooks.before_sync(syncable.entity_type(), data);

        self.fill(syncable, record, &data);
        self.associate_all(&mut run, syncable, record, tree.names(), &data)?;
        self.save(&mut run, record)?;
        self.sync_tree(&mut run, syncable, record, &tree, &data)?;

        run.hooks.synced(record);
        syncable.after_sync(record, &data)?;
        run.hooks.after_sync(record, &data);

        debug!(entity_type = record.entity_type(), report = %run.report, "sync finished");
        Ok(SyncOutcome::Synced(run.report))
    }

    /// Syncs the relations in `paths` of an already saved record.
    ///
    /// Runs no validation and does not save the record itself. Belongs-to
    /// relations at the top level are left to [`SyncEngine::sync_belongs_to`].
    pub fn sync_relationships(
        &self,
        record: &mut Record,
        paths: impl IntoPathTree,
        data: &DataNode,
    ) -> SyncResult<SyncReport> {
        let syncable = self.schema.get(record.entity_type())?;
        let tree = paths.into_path_tree();
        let mut hooks = SyncHooks::new();
        let mut run = Run {
            hooks: &mut hooks,
            report: SyncReport::default(),
        };
        self.sync_tree(&mut run, syncable, record, &tree, data)?;
        Ok(run.report)
    }

    /// Associates or dissociates the named belongs-to relations from `data`.
    ///
    /// Only changes attributes of `record`; nothing is saved. Names of other
    /// relation kinds are ignored.
    pub fn sync_belongs_to<N: AsRef<str>>(
        &self,
        record: &mut Record,
        data: &DataNode,
        names: &[N],
    ) -> SyncResult<SyncReport> {
        let syncable = self.schema.get(record.entity_type())?;
        let mut hooks = SyncHooks::new();
        let mut run = Run {
            hooks: &mut hooks,
            report: SyncReport::default(),
        };
        self.associate_all(
            &mut run,
            syncable,
            record,
            names.iter().map(|n| n.as_ref()),
            data,
        )?;
        Ok(run.report)
    }

    /// [`SyncEngine::sync_belongs_to`] over the top-level names of `paths`.
    pub fn sync_belongs_to_from_paths(
        &self,
        record: &mut Record,
        paths: impl IntoPathTree,
        data: &DataNode,
    ) -> SyncResult<SyncReport> {
        let tree = paths.into_path_tree();
        let names: Vec<&str> = tree.names().collect();
        self.sync_belongs_to(record, data, &names)
    }

    /// Validates `data` for a sync of `record` along `paths`.
    pub fn validate_for_sync(
        &self,
        record: &Record,
        paths: impl IntoPathTree,
        data: &DataNode,
    ) -> SyncResult<()> {
        let syncable = self.schema.get(record.entity_type())?;
        self.validate_tree(syncable, record, &paths.into_path_tree(), data)
    }

    /// The root-relative rule set a sync of `entity_type` would validate.
    pub fn complete_rules(
        &self,
        entity_type: &str,
        paths: impl IntoPathTree,
        data: &DataNode,
    ) -> SyncResult<RuleSet> {
        let syncable = self.schema.get(entity_type)?;
        rule_tree::complete_rules(
            self.schema,
            &self.config,
            syncable,
            &paths.into_path_tree(),
            data,
        )
    }

    /// `data` with existence bookkeeping on every node of `paths`.
    pub fn data_with_exists(
        &self,
        record: &Record,
        paths: impl IntoPathTree,
        data: &DataNode,
    ) -> SyncResult<DataNode> {
        let syncable = self.schema.get(record.entity_type())?;
        annotate(
            self.schema,
            &self.config,
            syncable,
            &paths.into_path_tree(),
            data,
            Some(root_hint(record)),
        )
    }

    fn validate_tree(
        &self,
        syncable: &dyn Syncable,
        record: &Record,
        tree: &PathTree,
        data: &DataNode,
    ) -> SyncResult<()> {
        let validator = self
            .validator
            .ok_or_else(|| SyncError::invalid_operation("validation enabled but no validator set"))?;
        let annotated = annotate(
            self.schema,
            &self.config,
            syncable,
            tree,
            data,
            Some(root_hint(record)),
        )?;
        let rules = rule_tree::complete_rules(self.schema, &self.config, syncable, tree, &annotated)?;
        trace!(entity_type = syncable.entity_type(), rules = rules.len(), "validating");
        validator.validate(&rules, &Value::Object(annotated), &syncable.sync_messages())
    }

    fn resolver(&self) -> RelatedResolver<'_, S> {
        RelatedResolver::new(self.schema, self.store, &self.config)
    }

    fn relation_of(&self, syncable: &dyn Syncable, name: &str) -> SyncResult<Relation> {
        syncable
            .relation(name)
            .ok_or_else(|| SyncError::unknown_relation(syncable.entity_type(), name))
    }

    /// Syncs every owned and many-to-many relation of `tree` present in
    /// `data`, then drops the cached copies of all of them.
    fn sync_tree(
        &self,
        run: &mut Run<'_, '_>,
        syncable: &dyn Syncable,
        record: &mut Record,
        tree: &PathTree,
        data: &DataNode,
    ) -> SyncResult<()> {
        for (name, node) in tree.iter() {
            let relation = self.relation_of(syncable, name)?;
            let field = self.config.field_name(name);
            let Some(value) = data.get(&field) else {
                continue;
            };

            match &relation {
                Relation::HasOne(_) | Relation::HasMany(_) => {
                    self.sync_owned(run, record, &field, &relation, value, &node.children())?;
                }
                Relation::BelongsToMany(m2m) => {
                    self.sync_pivot(run, record, &field, m2m, value)?;
                }
                // Associated before the owner's save.
                Relation::BelongsTo(_) | Relation::MorphTo(_) => {}
            }
            record.unset_relation(name);
        }
        Ok(())
    }

    /// Associates the belongs-to relations among `names` present in `data`.
    fn associate_all<'n>(
        &self,
        run: &mut Run<'_, '_>,
        syncable: &dyn Syncable,
        record: &mut Record,
        names: impl Iterator<Item = &'n str>,
        data: &DataNode,
    ) -> SyncResult<()> {
        for name in names {
            let relation = self.relation_of(syncable, name)?;
            if !relation.kind().is_belongs_to() {
                continue;
            }
            let Some(value) = data.get(&self.config.field_name(name)) else {
                continue;
            };
            self.sync_belongs_to_one(run, record, name, &relation, value)?;
        }
        Ok(())
    }

    /// Mass-assigns `data`, skipping relation fields, bookkeeping fields and
    /// attributes outside the type's fillable list.
    fn fill(&self, syncable: &dyn Syncable, record: &mut Record, data: &DataNode) {
        let relation_fields: BTreeSet<String> = syncable
            .relation_names()
            .iter()
            .map(|name| self.config.field_name(name))
            .collect();
        let fillable = syncable.fillable();
        record.fill_with(data, |field| {
            !self.config.is_annotation(field)
                && !relation_fields.contains(field)
                && fillable
                    .as_ref()
                    .map_or(true, |list| list.iter().any(|f| f == field))
        });
    }

    /// Inserts a new record or updates a dirty one.
    fn save(&self, run: &mut Run<'_, '_>, record: &mut Record) -> SyncResult<()> {
        if record.exists() {
            if !record.is_dirty() {
                trace!(entity_type = record.entity_type(), "record unchanged, skipping save");
                return Ok(());
            }
            self.store.update(record)?;
            run.report.updated += 1;
        } else {
            self.store.insert(record)?;
            run.report.created += 1;
        }
        record.finish_save();
        Ok(())
    }
}

impl<S: Store + ?Sized> fmt::Debug for SyncEngine<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("schema", self.schema)
            .field("validator", &self.validator.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn root_hint(record: &Record) -> ExistsHint {
    ExistsHint {
        exists: record.exists(),
        key: record.key(),
    }
}
