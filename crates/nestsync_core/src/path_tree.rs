//! Relationship path trees.
//!
//! A flat list of dot paths such as `["comments.author", "tags"]` becomes a
//! nested tree `{comments: {author: true}, tags: true}` that drives rule
//! generation, annotation and sync.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A node of a [`PathTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathNode {
    /// No further nesting.
    Leaf,
    /// Nested relationships.
    Branch(PathTree),
}

impl PathNode {
    /// The nested tree, empty for a leaf.
    pub fn children(&self) -> PathTree {
        match self {
            PathNode::Leaf => PathTree::new(),
            PathNode::Branch(tree) => tree.clone(),
        }
    }

    /// Returns true for a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, PathNode::Leaf)
    }
}

/// Nested mapping from relationship name to leaf or subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree {
    nodes: BTreeMap<String, PathNode>,
}

impl PathTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a single dot path.
    pub fn parse(path: &str) -> Self {
        let mut tree = Self::new();
        tree.insert(path);
        tree
    }

    /// Builds a tree from many dot paths.
    ///
    /// Paths sharing a prefix merge at that prefix; duplicates are ignored.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path.as_ref());
        }
        tree
    }

    /// Merges one dot path into the tree.
    ///
    /// Empty segments are skipped. A branch absorbs a leaf of the same name
    /// regardless of insertion order.
    pub fn insert(&mut self, path: &str) {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        self.insert_segments(&segments);
    }

    fn insert_segments(&mut self, segments: &[&str]) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };

        if rest.is_empty() {
            self.nodes
                .entry((*first).to_string())
                .or_insert(PathNode::Leaf);
            return;
        }

        let node = self
            .nodes
            .entry((*first).to_string())
            .or_insert(PathNode::Leaf);
        if node.is_leaf() {
            *node = PathNode::Branch(PathTree::new());
        }
        if let PathNode::Branch(child) = node {
            child.insert_segments(rest);
        }
    }

    /// Merges another tree into this one.
    pub fn merge(&mut self, other: &PathTree) {
        for path in other.paths() {
            self.insert(&path);
        }
    }

    /// Looks up a top-level relationship.
    pub fn get(&self, name: &str) -> Option<&PathNode> {
        self.nodes.get(name)
    }

    /// Top-level relationship names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Iterates over top-level entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of top-level relationships.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if there are no relationships.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flattens back into the minimal list of dot paths, one per leaf.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, node) in &self.nodes {
            match node {
                PathNode::Leaf => out.push(name.clone()),
                PathNode::Branch(child) => {
                    out.extend(child.paths().into_iter().map(|p| format!("{name}.{p}")));
                }
            }
        }
        out
    }

    /// Renders the `{a: {b: true}, d: true}` form.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .nodes
            .iter()
            .map(|(name, node)| {
                let value = match node {
                    PathNode::Leaf => Value::Bool(true),
                    PathNode::Branch(child) => child.to_value(),
                };
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

/// Anything that can be turned into a [`PathTree`].
pub trait IntoPathTree {
    /// Performs the conversion.
    fn into_path_tree(self) -> PathTree;
}

impl IntoPathTree for PathTree {
    fn into_path_tree(self) -> PathTree {
        self
    }
}

impl IntoPathTree for &PathTree {
    fn into_path_tree(self) -> PathTree {
        self.clone()
    }
}

impl IntoPathTree for &str {
    fn into_path_tree(self) -> PathTree {
        PathTree::parse(self)
    }
}

impl IntoPathTree for String {
    fn into_path_tree(self) -> PathTree {
        PathTree::parse(&self)
    }
}

impl<S: AsRef<str>> IntoPathTree for Vec<S> {
    fn into_path_tree(self) -> PathTree {
        PathTree::from_paths(self)
    }
}

impl<S: AsRef<str>> IntoPathTree for &[S] {
    fn into_path_tree(self) -> PathTree {
        PathTree::from_paths(self)
    }
}

impl<S: AsRef<str>, const N: usize> IntoPathTree for [S; N] {
    fn into_path_tree(self) -> PathTree {
        PathTree::from_paths(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shared_prefixes_merge() {
        let tree = PathTree::from_paths(["a.b", "a.c", "d"]);
        assert_eq!(tree.to_value(), json!({"a": {"b": true, "c": true}, "d": true}));
    }

    #[test]
    fn input_order_does_not_matter() {
        let forward = PathTree::from_paths(["a.b", "a.c", "d"]);
        let backward = PathTree::from_paths(["d", "a.c", "a.b"]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn branch_absorbs_leaf() {
        let leaf_first = PathTree::from_paths(["a", "a.b"]);
        let branch_first = PathTree::from_paths(["a.b", "a"]);
        assert_eq!(leaf_first, branch_first);
        assert_eq!(leaf_first.to_value(), json!({"a": {"b": true}}));
    }

    #[test]
    fn duplicates_are_idempotent() {
        let tree = PathTree::from_paths(["comments.author", "comments.author", "tags"]);
        assert_eq!(tree.paths(), vec!["comments.author", "tags"]);
    }

    #[test]
    fn empty_segments_are_skipped() {
        assert!(PathTree::parse("").is_empty());
        assert_eq!(PathTree::parse("a..b.").to_value(), json!({"a": {"b": true}}));
    }

    #[test]
    fn conversions() {
        let built = PathTree::from_paths(["comments.author"]);
        assert_eq!("comments.author".into_path_tree(), built);
        assert_eq!(String::from("comments.author").into_path_tree(), built);
        assert_eq!(vec!["comments.author"].into_path_tree(), built);
        assert_eq!(built.clone().into_path_tree(), built);
        assert_eq!((&built).into_path_tree(), built);
    }

    #[test]
    fn children_of_leaf_are_empty() {
        let tree = PathTree::from_paths(["comments.reactions", "tags"]);
        assert!(tree.get("tags").unwrap().children().is_empty());
        assert_eq!(
            tree.get("comments").unwrap().children().to_value(),
            json!({"reactions": true})
        );
    }

    #[test]
    fn merge_trees() {
        let mut tree = PathTree::parse("a.b");
        tree.merge(&PathTree::from_paths(["a.c", "d"]));
        assert_eq!(tree, PathTree::from_paths(["a.b", "a.c", "d"]));
    }
}
