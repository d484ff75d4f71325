//! Benchmark utilities.

use nestsync_core::DataNode;
use nestsync_testkit::{node, TestBlog};
use serde_json::{json, Value};

/// Comment payloads with bodies and one reaction each.
///
/// With `keyed`, comments carry keys `1..=count`.
pub fn comment_payloads(count: usize, keyed: bool) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            let mut comment = json!({
                "body": format!("comment {i}"),
                "reactions": [{"kind": "like"}],
            });
            if keyed {
                comment["id"] = json!(i);
            }
            comment
        })
        .collect()
}

/// A post update submitting `count` comments.
pub fn post_payload(count: usize, keyed: bool) -> DataNode {
    node(json!({
        "title": "Benchmark",
        "comments": comment_payloads(count, keyed),
    }))
}

/// A blog with post 1 owning comments `1..=count`.
pub fn blog_with_comments(count: usize) -> TestBlog {
    let blog = TestBlog::new();
    blog.seed("posts", json!({"id": 1, "title": "Benchmark"}));
    for i in 1..=count {
        blog.seed(
            "comments",
            json!({"id": i, "post_id": 1, "body": format!("comment {i}"), "position": count + 1 - i}),
        );
    }
    blog
}

/// Dot paths fanning out `width` relations at each of `depth` levels.
pub fn wide_paths(depth: usize, width: usize) -> Vec<String> {
    let mut paths = vec![String::new()];
    for _ in 0..depth {
        paths = paths
            .iter()
            .flat_map(|prefix| {
                (0..width).map(move |i| {
                    if prefix.is_empty() {
                        format!("rel_{i}")
                    } else {
                        format!("{prefix}.rel_{i}")
                    }
                })
            })
            .collect();
    }
    paths
}
