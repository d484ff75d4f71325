//! Property-based test generators using proptest.

use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating relation names.
pub fn relation_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,7}").expect("Invalid regex")
}

/// Strategy for generating dot paths of one to four relation names.
pub fn dot_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(relation_name_strategy(), 1..5).prop_map(|names| names.join("."))
}

/// Strategy for generating lists of dot paths.
pub fn path_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(dot_path_strategy(), 0..10)
}

/// Strategy for generating a child count with the subset of keys kept.
///
/// Keys run from 1 to the count; the subset is sorted.
pub fn kept_children_strategy() -> impl Strategy<Value = (i64, Vec<i64>)> {
    (1i64..8).prop_flat_map(|count| {
        (
            Just(count),
            prop::sample::subsequence((1..=count).collect::<Vec<_>>(), 0..=count as usize),
        )
    })
}

/// Strategy for generating comment payloads for new comments.
pub fn new_comments_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(
        prop::string::string_regex("[a-z ]{1,24}")
            .expect("Invalid regex")
            .prop_filter("Body must not be blank", |s| !s.trim().is_empty()),
        0..6,
    )
    .prop_map(|bodies| bodies.into_iter().map(|body| json!({"body": body})).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_dot_paths_have_segments(path in dot_path_strategy()) {
            prop_assert!(!path.is_empty());
            prop_assert!(path.split('.').all(|s| !s.is_empty()));
        }

        #[test]
        fn test_kept_children_in_range((count, kept) in kept_children_strategy()) {
            prop_assert!(kept.iter().all(|k| (1..=count).contains(k)));
            prop_assert!(kept.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn test_new_comments_have_bodies(comments in new_comments_strategy()) {
            for comment in comments {
                prop_assert!(comment["body"].as_str().is_some_and(|b| !b.trim().is_empty()));
            }
        }
    }
}
