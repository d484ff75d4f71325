//! Rule evaluation.

use crate::messages::{default_template, render};
use crate::paths::{expand, lookup, substitute, Expanded};
use nestsync_core::{
    Constraint, Messages, Rule, RuleSet, Store, SyncResult, ValidationErrors, Validator,
};
use serde_json::Value;
use tracing::{debug, trace, warn};

/// Evaluates a flat, dot-keyed [`RuleSet`] against a JSON tree.
///
/// Wildcard keys fan out over sequences, implicit rules (`required*`) run
/// on absent fields, everything else only on present ones. `exists` rules
/// are checked against the store; a failing store aborts validation with
/// its own error instead of failing the rule.
pub struct RuleValidator<'s> {
    store: &'s dyn Store,
}

impl<'s> RuleValidator<'s> {
    /// Creates a validator checking `exists` rules against `store`.
    pub fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    fn check(
        &self,
        key: &str,
        rules: &[Rule],
        data: &Value,
        found: &Expanded<'_>,
        messages: &Messages,
        errors: &mut ValidationErrors,
    ) -> SyncResult<()> {
        let value = found.value;
        let nullable = rules.contains(&Rule::Nullable);

        for rule in rules {
            let failed = match rule {
                Rule::Required => !is_present(value),
                Rule::RequiredIf { field, value: expected } => {
                    let other = lookup(data, &substitute(field, &found.wildcards));
                    other.is_some_and(|o| loosely_equal(o, expected)) && !is_present(value)
                }
                Rule::RequiredUnless { field, value: expected } => {
                    let other = lookup(data, &substitute(field, &found.wildcards));
                    !other.is_some_and(|o| loosely_equal(o, expected)) && !is_present(value)
                }
                _ => {
                    let Some(present) = value else {
                        continue;
                    };
                    if present.is_null() && nullable {
                        continue;
                    }
                    !self.passes(rule, rules, present)?
                }
            };

            if failed {
                let template = messages
                    .lookup(key, rule.name())
                    .map(str::to_string)
                    .unwrap_or_else(|| default_template(rule).to_string());
                trace!(path = %found.path, rule = rule.name(), "rule failed");
                errors.add(found.path.clone(), rule.name(), render(&template, &found.path, rule));
                if rule.is_implicit() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn passes(&self, rule: &Rule, rules: &[Rule], value: &Value) -> SyncResult<bool> {
        let passed = match rule {
            Rule::Nullable => true,
            Rule::String => value.is_string(),
            Rule::Integer => as_integer(value).is_some(),
            Rule::Numeric => as_number(value).is_some(),
            Rule::Boolean => {
                value.is_boolean()
                    || matches!(value.as_i64(), Some(0 | 1))
                    || matches!(value.as_str(), Some("0" | "1" | "true" | "false"))
            }
            Rule::Array => value.is_array() || value.is_object(),
            Rule::Min(min) => size(value, rules).is_some_and(|s| s >= *min),
            Rule::Max(max) => size(value, rules).is_some_and(|s| s <= *max),
            Rule::In(allowed) => allowed.iter().any(|a| loosely_equal(value, a)),
            Rule::Exists { entity_type, column } => {
                let constraint = Constraint::new(column.clone(), value.clone());
                let keys = self
                    .store
                    .keys_where(entity_type, &[constraint])
                    .inspect_err(|err| {
                        warn!(%err, entity_type = entity_type.as_str(), "exists lookup failed");
                    })?;
                !keys.is_empty()
            }
            Rule::Required | Rule::RequiredIf { .. } | Rule::RequiredUnless { .. } => true,
        };
        Ok(passed)
    }
}

impl Validator for RuleValidator<'_> {
    fn validate(
        &self,
        rules: &RuleSet,
        data: &Value,
        messages: &Messages,
    ) -> SyncResult<()> {
        let mut errors = ValidationErrors::new();
        for (key, key_rules) in rules.iter() {
            for found in expand(key, data) {
                self.check(key, key_rules, data, &found, messages, &mut errors)?;
            }
        }
        debug!(rules = rules.len(), failures = errors.len(), "validated");
        errors.into_result()?;
        Ok(())
    }
}

/// Present means not absent, not null, not a blank string and not an
/// empty collection.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers compare by value when the field is numeric, strings by
/// character count, collections by length.
fn size(value: &Value, rules: &[Rule]) -> Option<f64> {
    let numeric = rules
        .iter()
        .any(|r| matches!(r, Rule::Numeric | Rule::Integer));
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if numeric => s.trim().parse().ok(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        _ => None,
    }
}

/// Scalar comparison where `1`, `"1"` and `true` are alike.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (scalar_text(left), scalar_text(right)) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestsync_core::{Key, Pivot, PivotChanges, PivotEntry, Record, SyncError};
    use nestsync_store::MemoryStore;
    use serde_json::json;

    fn validate_with(
        store: &dyn Store,
        rules: RuleSet,
        data: Value,
        messages: &Messages,
    ) -> Result<(), ValidationErrors> {
        match RuleValidator::new(store).validate(&rules, &data, messages) {
            Ok(()) => Ok(()),
            Err(SyncError::Validation(errors)) => Err(errors),
            Err(other) => panic!("expected validation result, got {other}"),
        }
    }

    fn validate(store: &MemoryStore, rules: RuleSet, data: Value) -> Result<(), ValidationErrors> {
        validate_with(store, rules, data, &Messages::new())
    }

    /// A store whose every call fails.
    struct OfflineStore;

    impl Store for OfflineStore {
        fn find(&self, _: &str, _: &str, _: &Key) -> SyncResult<Option<Record>> {
            Err(SyncError::storage("offline"))
        }

        fn keys_where(&self, _: &str, _: &[Constraint]) -> SyncResult<Vec<Key>> {
            Err(SyncError::storage("offline"))
        }

        fn insert(&self, _: &mut Record) -> SyncResult<()> {
            Err(SyncError::storage("offline"))
        }

        fn update(&self, _: &Record) -> SyncResult<()> {
            Err(SyncError::storage("offline"))
        }

        fn delete(&self, _: &Record) -> SyncResult<()> {
            Err(SyncError::storage("offline"))
        }

        fn sync_pivot(&self, _: &Pivot, _: &Key, _: &[PivotEntry]) -> SyncResult<PivotChanges> {
            Err(SyncError::storage("offline"))
        }
    }

    #[test]
    fn required_and_types() {
        let store = MemoryStore::new();
        let rules = RuleSet::new()
            .with("title", [Rule::Required, Rule::String])
            .with("views", [Rule::Integer, Rule::Min(0.0)]);

        assert!(validate(&store, rules.clone(), json!({"title": "x", "views": 3})).is_ok());

        let errors = validate(&store, rules.clone(), json!({"views": -1})).unwrap_err();
        assert!(errors.has_rule("title", "required"));
        assert!(errors.has_rule("views", "min"));

        let errors = validate(&store, rules, json!({"title": "  "})).unwrap_err();
        assert_eq!(errors.paths(), vec!["title"]);
    }

    #[test]
    fn wildcards_report_concrete_paths() {
        let store = MemoryStore::new();
        let rules = RuleSet::new().with("comments.*.reactions.*.kind", [Rule::Required]);
        let data = json!({"comments": [
            {"reactions": [{"kind": "like"}]},
            {"reactions": [{"kind": "like"}, {}]},
        ]});
        let errors = validate(&store, rules, data).unwrap_err();
        assert_eq!(errors.paths(), vec!["comments.1.reactions.1.kind"]);
    }

    #[test]
    fn conditional_rules_follow_wildcards() {
        let store = MemoryStore::new();
        let rules = RuleSet::new().with(
            "comments.*.body",
            [Rule::required_unless("comments.*._exists", true)],
        );
        let data = json!({"comments": [
            {"_exists": true},
            {"_exists": false},
            {"_exists": false, "body": "new"},
        ]});
        let errors = validate(&store, rules, data).unwrap_err();
        assert_eq!(errors.paths(), vec!["comments.1.body"]);
    }

    #[test]
    fn nullable_and_absent_fields() {
        let store = MemoryStore::new();
        let rules = RuleSet::new()
            .with("summary", [Rule::Nullable, Rule::String])
            .with("body", [Rule::String]);
        assert!(validate(&store, rules.clone(), json!({"summary": null})).is_ok());
        let errors = validate(&store, rules, json!({"body": null})).unwrap_err();
        assert!(errors.has_rule("body", "string"));
    }

    #[test]
    fn in_and_boolean() {
        let store = MemoryStore::new();
        let rules = RuleSet::new()
            .with("kind", [Rule::one_of(["like", "love"])])
            .with("flag", [Rule::Boolean]);
        assert!(validate(&store, rules.clone(), json!({"kind": "love", "flag": 1})).is_ok());
        let errors = validate(&store, rules, json!({"kind": "meh", "flag": "yes"})).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn exists_checks_the_store() {
        let store = MemoryStore::new();
        store
            .insert_row("users", "id", json!({"id": 5}).as_object().cloned().unwrap())
            .unwrap();
        let rules = RuleSet::new().with("author.id", [Rule::exists("users", "id")]);

        assert!(validate(&store, rules.clone(), json!({"author": {"id": 5}})).is_ok());
        assert!(validate(&store, rules.clone(), json!({"author": {"id": "5"}})).is_ok());
        assert!(validate(&store, rules.clone(), json!({"author": null})).is_ok());
        let errors = validate(&store, rules, json!({"author": {"id": 6}})).unwrap_err();
        assert!(errors.has_rule("author.id", "exists"));
    }

    #[test]
    fn store_failure_is_not_a_rule_failure() {
        let store = OfflineStore;
        let rules = RuleSet::new().with("author.id", [Rule::exists("users", "id")]);
        let err = RuleValidator::new(&store)
            .validate(&rules, &json!({"author": {"id": 5}}), &Messages::new())
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage { .. }));

        assert!(RuleValidator::new(&store)
            .validate(&rules, &json!({"author": null}), &Messages::new())
            .is_ok());
    }

    #[test]
    fn custom_messages() {
        let store = MemoryStore::new();
        let rules = RuleSet::new().with("comments.*.body", [Rule::Required]);
        let messages = Messages::new()
            .with("comments.*.body.required", "Say something in :attribute.")
            .with("required", "Missing.");
        let errors = validate_with(&store, rules, json!({"comments": [{}]}), &messages).unwrap_err();
        assert_eq!(errors.first("comments.0.body"), Some("Say something in comments.0.body."));

        let rules = RuleSet::new().with("title", [Rule::Required]);
        let errors = validate_with(&store, rules, json!({}), &messages).unwrap_err();
        assert_eq!(errors.first("title"), Some("Missing."));
    }
}
