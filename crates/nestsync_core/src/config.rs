//! Configuration for the sync engine.

use std::fmt;
use std::sync::Arc;

/// How relation names map to field names in submitted data.
#[derive(Clone, Default)]
pub enum FieldNaming {
    /// The field is named exactly like the relation.
    #[default]
    Identity,
    /// `postMeta` is read from `post_meta`.
    SnakeCase,
    /// Caller-supplied mapping.
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl FieldNaming {
    /// Maps a relation name to its data field name.
    pub fn field_name(&self, relation: &str) -> String {
        match self {
            FieldNaming::Identity => relation.to_string(),
            FieldNaming::SnakeCase => snake_case(relation),
            FieldNaming::Custom(f) => f(relation),
        }
    }
}

impl fmt::Debug for FieldNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldNaming::Identity => f.write_str("Identity"),
            FieldNaming::SnakeCase => f.write_str("SnakeCase"),
            FieldNaming::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Converts `camelCase` / `PascalCase` to `snake_case`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Relation name to data field name mapping.
    pub field_naming: FieldNaming,
    /// Annotation field: whether the node already exists.
    pub exists_field: String,
    /// Annotation field: the node's resolved key.
    pub key_field: String,
    /// Annotation field: the node's key column name.
    pub key_name_field: String,
    /// Sub-field of many-to-many items carrying extra pivot attributes.
    pub pivot_field: String,
    /// Pivot columns never taken from submitted extras (besides both keys).
    pub pivot_ignored_columns: Vec<String>,
    /// Discriminator field of polymorphic belongs-to items.
    pub morph_type_field: String,
    /// Whether `save_and_sync` validates before writing.
    pub validate: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            field_naming: FieldNaming::Identity,
            exists_field: "_exists".to_string(),
            key_field: "_pk".to_string(),
            key_name_field: "_pk_name".to_string(),
            pivot_field: "pivot".to_string(),
            pivot_ignored_columns: vec!["created_at".to_string(), "updated_at".to_string()],
            morph_type_field: "type".to_string(),
            validate: true,
        }
    }

    /// Sets the field naming.
    #[must_use]
    pub fn with_field_naming(mut self, naming: FieldNaming) -> Self {
        self.field_naming = naming;
        self
    }

    /// Uses a custom relation-to-field mapping.
    #[must_use]
    pub fn with_field_mapper(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.field_naming = FieldNaming::Custom(Arc::new(f));
        self
    }

    /// Sets the pivot extras field.
    #[must_use]
    pub fn with_pivot_field(mut self, field: impl Into<String>) -> Self {
        self.pivot_field = field.into();
        self
    }

    /// Sets the polymorphic discriminator field.
    #[must_use]
    pub fn with_morph_type_field(mut self, field: impl Into<String>) -> Self {
        self.morph_type_field = field.into();
        self
    }

    /// Enables or disables validation in `save_and_sync`.
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Maps a relation name to its data field name.
    pub fn field_name(&self, relation: &str) -> String {
        self.field_naming.field_name(relation)
    }

    /// Returns true for fields added by the annotator.
    pub fn is_annotation(&self, field: &str) -> bool {
        field == self.exists_field || field == self.key_field || field == self.key_name_field
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
