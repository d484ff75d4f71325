//! Validation rules and flat, dot-keyed rule sets.

use serde_json::Value;
use std::collections::BTreeMap;

/// A single validation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// The field must be present and non-empty.
    Required,
    /// Required when another field equals `value`.
    RequiredIf {
        /// Referenced field, relative to the declaring node until the set
        /// is made relative.
        field: String,
        /// Triggering value.
        value: Value,
    },
    /// Required unless another field equals `value`.
    RequiredUnless {
        /// Referenced field, relative to the declaring node until the set
        /// is made relative.
        field: String,
        /// Exempting value.
        value: Value,
    },
    /// Null is accepted and skips the remaining rules.
    Nullable,
    /// Must be a string.
    String,
    /// Must be an integer (or integer string).
    Integer,
    /// Must be a number (or numeric string).
    Numeric,
    /// Must be a boolean (or 0/1).
    Boolean,
    /// Must be a sequence or mapping.
    Array,
    /// Minimum numeric value, string length or element count.
    Min(f64),
    /// Maximum numeric value, string length or element count.
    Max(f64),
    /// Must equal one of the listed values.
    In(Vec<Value>),
    /// A row with `column = value` must exist in `entity_type`.
    Exists {
        /// Entity type (table) to look in.
        entity_type: String,
        /// Column compared against the value.
        column: String,
    },
}

impl Rule {
    /// `RequiredIf` constructor.
    pub fn required_if(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Rule::RequiredIf {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `RequiredUnless` constructor.
    pub fn required_unless(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Rule::RequiredUnless {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `In` constructor.
    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Rule::In(values.into_iter().map(Into::into).collect())
    }

    /// `Exists` constructor.
    pub fn exists(entity_type: impl Into<String>, column: impl Into<String>) -> Self {
        Rule::Exists {
            entity_type: entity_type.into(),
            column: column.into(),
        }
    }

    /// Rule name used in messages and error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::RequiredIf { .. } => "required_if",
            Rule::RequiredUnless { .. } => "required_unless",
            Rule::Nullable => "nullable",
            Rule::String => "string",
            Rule::Integer => "integer",
            Rule::Numeric => "numeric",
            Rule::Boolean => "boolean",
            Rule::Array => "array",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::In(_) => "in",
            Rule::Exists { .. } => "exists",
        }
    }

    /// Implicit rules are evaluated even when the value is absent.
    pub fn is_implicit(&self) -> bool {
        matches!(
            self,
            Rule::Required | Rule::RequiredIf { .. } | Rule::RequiredUnless { .. }
        )
    }

    /// The sibling field this rule reads, if any.
    pub fn field_reference(&self) -> Option<&str> {
        match self {
            Rule::RequiredIf { field, .. } | Rule::RequiredUnless { field, .. } => Some(field),
            _ => None,
        }
    }

    fn prefix_reference(self, scope: &str) -> Self {
        if scope.is_empty() {
            return self;
        }
        match self {
            Rule::RequiredIf { field, value } => Rule::RequiredIf {
                field: format!("{scope}.{field}"),
                value,
            },
            Rule::RequiredUnless { field, value } => Rule::RequiredUnless {
                field: format!("{scope}.{field}"),
                value,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RuleEntry {
    rules: Vec<Rule>,
    /// Path of the node that declared each rule, parallel to `rules`.
    scopes: Vec<String>,
}

impl RuleEntry {
    fn push(&mut self, scope: &str, rule: Rule) {
        self.rules.push(rule);
        self.scopes.push(scope.to_string());
    }
}

/// Flat mapping from dot key to rules.
///
/// Keys may contain `*` wildcards standing for every element of a sequence.
/// Each rule remembers the node that declared it, so field references can
/// be rewritten against the data root by [`RuleSet::into_relative`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: BTreeMap<String, RuleEntry>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RuleSet::extend`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.extend(key, rules);
        self
    }

    /// Replaces the rules for `key`.
    pub fn insert(&mut self, key: impl Into<String>, rules: impl IntoIterator<Item = Rule>) {
        let key = key.into();
        self.entries.remove(&key);
        self.extend(key, rules);
    }

    /// Appends rules for `key`.
    pub fn extend(&mut self, key: impl Into<String>, rules: impl IntoIterator<Item = Rule>) {
        let entry = self.entries.entry(key.into()).or_default();
        for rule in rules {
            entry.push("", rule);
        }
    }

    /// Appends one rule for `key`.
    pub fn push(&mut self, key: impl Into<String>, rule: Rule) {
        self.extend(key, [rule]);
    }

    /// Nests `sub` under `prefix`: every key and declaring scope gains the
    /// prefix.
    pub fn nest(&mut self, prefix: &str, sub: RuleSet) {
        for (key, entry) in sub.entries {
            let target = self.entries.entry(join(prefix, &key)).or_default();
            for (rule, scope) in entry.rules.into_iter().zip(entry.scopes) {
                target.push(&join(prefix, &scope), rule);
            }
        }
    }

    /// Merges `other` at the same level.
    pub fn merge(&mut self, other: RuleSet) {
        self.nest("", other);
    }

    /// Rewrites field references so they address the data root.
    ///
    /// A `RequiredIf` on `_exists` declared by a comment node nested under
    /// `comments.*` becomes a reference to `comments.*._exists`.
    #[must_use]
    pub fn into_relative(self) -> RuleSet {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, entry)| {
                let mut relative = RuleEntry::default();
                for (rule, scope) in entry.rules.into_iter().zip(entry.scopes) {
                    relative.push("", rule.prefix_reference(&scope));
                }
                (key, relative)
            })
            .collect();
        RuleSet { entries }
    }

    /// Rules declared for `key`.
    pub fn get(&self, key: &str) -> Option<&[Rule]> {
        self.entries.get(key).map(|e| e.rules.as_slice())
    }

    /// Returns true if `key` has rules.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over `(key, rules)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.entries
            .iter()
            .map(|(k, e)| (k.as_str(), e.rules.as_slice()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no keys are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn join(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{key}"),
    }
}
