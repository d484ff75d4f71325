//! Dot-path lookup and wildcard expansion over JSON trees.

use serde_json::Value;

/// One concrete match of a rule key.
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded<'v> {
    /// Concrete dot path, wildcards replaced by indexes.
    pub path: String,
    /// The value at the path; `None` when absent.
    pub value: Option<&'v Value>,
    /// Segments substituted for each `*`, in order.
    pub wildcards: Vec<String>,
}

/// Expands a rule key against `data`.
///
/// A `*` segment fans out over every element of a sequence (or entry of a
/// mapping) and matches nothing when the container is missing. Other
/// segments always produce a match, with `value: None` when absent.
pub fn expand<'v>(key: &str, data: &'v Value) -> Vec<Expanded<'v>> {
    let segments: Vec<&str> = if key.is_empty() {
        Vec::new()
    } else {
        key.split('.').collect()
    };
    let mut out = Vec::new();
    walk(&segments, Some(data), String::new(), Vec::new(), &mut out);
    out
}

fn walk<'v>(
    segments: &[&str],
    current: Option<&'v Value>,
    path: String,
    wildcards: Vec<String>,
    out: &mut Vec<Expanded<'v>>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(Expanded {
            path,
            value: current,
            wildcards,
        });
        return;
    };

    if *segment == "*" {
        let children: Vec<(String, &'v Value)> = match current {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            _ => Vec::new(),
        };
        for (name, child) in children {
            let mut wildcards = wildcards.clone();
            wildcards.push(name.clone());
            walk(rest, Some(child), join(&path, &name), wildcards, out);
        }
        return;
    }

    let child = current.and_then(|value| child_of(value, segment));
    walk(rest, child, join(&path, segment), wildcards, out);
}

fn child_of<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

/// Replaces the `*` segments of `reference` with `wildcards`, in order.
pub fn substitute(reference: &str, wildcards: &[String]) -> String {
    let mut fill = wildcards.iter();
    reference
        .split('.')
        .map(|segment| {
            if segment == "*" {
                fill.next().map_or(segment, String::as_str)
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Reads the value at a concrete dot path.
pub fn lookup<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(data);
    }
    path.split('.')
        .try_fold(data, |value, segment| child_of(value, segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_wildcards() {
        let data = json!({"comments": [{"body": "a"}, {"title": "b"}]});
        let matches = expand("comments.*.body", &data);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].path, "comments.0.body");
        assert_eq!(matches[0].value, Some(&json!("a")));
        assert_eq!(matches[1].path, "comments.1.body");
        assert_eq!(matches[1].value, None);
        assert_eq!(matches[1].wildcards, vec!["1"]);
    }

    #[test]
    fn missing_container_matches_nothing_for_wildcards() {
        let data = json!({});
        assert!(expand("comments.*.body", &data).is_empty());
        let plain = expand("meta.summary", &data);
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].path, "meta.summary");
        assert_eq!(plain[0].value, None);
    }

    #[test]
    fn nested_wildcards_and_substitution() {
        let data = json!({"comments": [{"reactions": [{"kind": "x"}, {"kind": "y"}]}]});
        let matches = expand("comments.*.reactions.*.kind", &data);
        assert_eq!(matches[1].path, "comments.0.reactions.1.kind");
        assert_eq!(
            substitute("comments.*.reactions.*._exists", &matches[1].wildcards),
            "comments.0.reactions.1._exists"
        );
        assert_eq!(substitute("title", &matches[1].wildcards), "title");
    }

    #[test]
    fn lookup_paths() {
        let data = json!({"a": [{"b": 1}]});
        assert_eq!(lookup(&data, "a.0.b"), Some(&json!(1)));
        assert_eq!(lookup(&data, "a.1.b"), None);
        assert_eq!(lookup(&data, ""), Some(&data));
    }
}
