//! Validation collaborator interface.
//!
//! The engine generates a flat, dot-keyed [`RuleSet`] and hands it to a
//! [`Validator`] together with the annotated data. Evaluating the rules is
//! the validator's job; the engine only needs a pass/fail answer carrying
//! the same dot keys.

use crate::error::SyncResult;
use crate::rules::RuleSet;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Evaluates a flat rule mapping against a data tree.
pub trait Validator {
    /// Validates `data` against `rules`.
    ///
    /// `messages` holds custom message templates keyed by `"<key>.<rule>"`
    /// or `"<rule>"`. Failed rules are reported as
    /// [`SyncError::Validation`](crate::SyncError::Validation); any other error means the rules could not
    /// be evaluated at all.
    fn validate(&self, rules: &RuleSet, data: &Value, messages: &Messages) -> SyncResult<()>;
}

/// Custom validation message templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Messages {
    templates: BTreeMap<String, String>,
}

impl Messages {
    /// Creates an empty message table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template, returning the table.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(key, template);
        self
    }

    /// Adds a template.
    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(key.into(), template.into());
    }

    /// Finds the template for a rule failing on `key`.
    ///
    /// The specific `"<key>.<rule>"` entry wins over the generic `"<rule>"`.
    pub fn lookup(&self, key: &str, rule: &str) -> Option<&str> {
        self.templates
            .get(&format!("{key}.{rule}"))
            .or_else(|| self.templates.get(rule))
            .map(String::as_str)
    }

    /// Returns true if no templates are declared.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// A single failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Name of the failed rule (`"required"`, `"exists"`, ...).
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

/// Structured validation failure keyed by concrete dot paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure of `rule` on `path`.
    pub fn add(&mut self, path: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(path.into()).or_default().push(FieldError {
            rule: rule.into(),
            message: message.into(),
        });
    }

    /// Returns true if `path` has at least one failure.
    pub fn has(&self, path: &str) -> bool {
        self.errors.contains_key(path)
    }

    /// Returns true if `rule` failed on `path`.
    pub fn has_rule(&self, path: &str, rule: &str) -> bool {
        self.errors
            .get(path)
            .is_some_and(|errors| errors.iter().any(|e| e.rule == rule))
    }

    /// Returns the first message recorded for `path`.
    pub fn first(&self, path: &str) -> Option<&str> {
        self.errors
            .get(path)
            .and_then(|errors| errors.first())
            .map(|e| e.message.as_str())
    }

    /// Returns the failures recorded for `path`.
    pub fn get(&self, path: &str) -> &[FieldError] {
        self.errors.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over failing paths in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldError])> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns the failing paths.
    pub fn paths(&self) -> Vec<&str> {
        self.errors.keys().map(String::as_str).collect()
    }

    /// Number of failing paths.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts into `Ok(())` when empty.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (path, errors) in &self.errors {
            for error in errors {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{path}: {}", error.message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lookup_prefers_specific_key() {
        let messages = Messages::new()
            .with("required", "Missing :attribute")
            .with("title.required", "A post needs a title");

        assert_eq!(messages.lookup("title", "required"), Some("A post needs a title"));
        assert_eq!(messages.lookup("body", "required"), Some("Missing :attribute"));
        assert_eq!(messages.lookup("body", "string"), None);
    }

    #[test]
    fn errors_collect_by_path() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("comments.0.body", "required", "The body is required.");
        errors.add("comments.0.body", "string", "The body must be a string.");
        errors.add("author.id", "exists", "The selected author is invalid.");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("comments.0.body").len(), 2);
        assert_eq!(errors.first("author.id"), Some("The selected author is invalid."));
        assert!(errors.has_rule("comments.0.body", "string"));
        assert!(!errors.has("title"));
        assert_eq!(errors.paths(), vec!["author.id", "comments.0.body"]);
        assert!(errors.to_string().contains("author.id: The selected author is invalid."));
    }
}
