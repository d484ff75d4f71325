//! Primary-key values and column filters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// `2^63`, the first float magnitude that does not fit an `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A normalised primary-key value.
///
/// Keys compare loosely the way submitted data expects: the string `"3"`
/// and the number `3` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Integer key (auto-increment style).
    Int(i64),
    /// Any other non-empty key (UUIDs, slugs).
    Str(String),
}

impl Key {
    /// Builds a key from a submitted value.
    ///
    /// Returns `None` for empty values: null, blank strings, `0`, `"0"`,
    /// booleans, arrays and objects. Whole numbers outside the `i64` range
    /// become string keys instead of being clamped.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    return (int != 0).then_some(Key::Int(int));
                }
                let whole = n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0);
                if !whole {
                    return None;
                }
                // Whole numbers outside i64 keep their exact digits.
                match n.as_f64() {
                    Some(f) if !n.is_u64() && f.abs() < I64_BOUND => {
                        let int = f as i64;
                        (int != 0).then_some(Key::Int(int))
                    }
                    _ => Some(Key::Str(n.to_string())),
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<i64>() {
                    Ok(0) => None,
                    Ok(int) => Some(Key::Int(int)),
                    Err(_) => Some(Key::Str(s.clone())),
                }
            }
            _ => None,
        }
    }

    /// Reads the key stored under `field` in a data node.
    pub fn from_field(node: &Map<String, Value>, field: &str) -> Option<Key> {
        node.get(field).and_then(Key::from_value)
    }

    /// Converts back to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(int) => Value::from(*int),
            Key::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(int) => write!(f, "{int}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

/// Compares two attribute values, treating key-like values loosely.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (Key::from_value(left), Key::from_value(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// A `column = value` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Column name.
    pub column: String,
    /// Required value.
    pub value: Value,
}

impl Constraint {
    /// Creates a new constraint.
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Returns true if the row satisfies the constraint.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        row.get(&self.column)
            .is_some_and(|value| loose_eq(value, &self.value))
    }
}

/// Returns true if the row satisfies every constraint.
pub fn matches_all(constraints: &[Constraint], row: &Map<String, Value>) -> bool {
    constraints.iter().all(|c| c.matches(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values_are_not_keys() {
        for value in [json!(null), json!(""), json!("  "), json!(0), json!("0"), json!(false), json!([]), json!({})] {
            assert_eq!(Key::from_value(&value), None, "{value} should be empty");
        }
    }

    #[test]
    fn numeric_strings_normalise() {
        assert_eq!(Key::from_value(&json!("3")), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&json!(3)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&json!(3.0)), Some(Key::Int(3)));
        assert_eq!(
            Key::from_value(&json!("a1b2")),
            Some(Key::Str("a1b2".into()))
        );
    }

    #[test]
    fn out_of_range_numbers_stay_distinct() {
        let max = Key::from_value(&json!(u64::MAX)).unwrap();
        let below = Key::from_value(&json!(u64::MAX - 1)).unwrap();
        assert_eq!(max, Key::Str(u64::MAX.to_string()));
        assert_ne!(max, below);
        assert_ne!(max, Key::Int(i64::MAX));
        assert_eq!(Key::from_value(&json!(i64::MAX)), Some(Key::Int(i64::MAX)));
        assert_eq!(Key::from_value(&json!(u64::MAX.to_string())), Some(max));
        assert_eq!(Key::from_value(&json!(1.5)), None);
    }

    #[test]
    fn key_round_trips_to_value() {
        assert_eq!(Key::Int(7).to_value(), json!(7));
        assert_eq!(Key::from("abc").to_value(), json!("abc"));
        assert_eq!(Key::Int(7).to_string(), "7");
    }

    #[test]
    fn constraint_matches_loosely() {
        let row = json!({"post_id": "4", "kind": "note"});
        let row = row.as_object().unwrap();

        assert!(Constraint::new("post_id", 4).matches(row));
        assert!(Constraint::new("kind", "note").matches(row));
        assert!(!Constraint::new("kind", "other").matches(row));
        assert!(!Constraint::new("missing", 1).matches(row));
        assert!(matches_all(
            &[Constraint::new("post_id", 4), Constraint::new("kind", "note")],
            row
        ));
    }
}
