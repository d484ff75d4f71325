//! Test fixtures: a blog schema and store helpers.
//!
//! The blog schema covers every relation kind:
//! - `posts` has many `comments`, has one `post_meta`, belongs to a `users`
//!   author, belongs to many `tags` through `post_tag`, and morphs many
//!   `images`
//! - `comments` are ordered by `position`, belong to an author and have many
//!   `reactions`
//! - `images` morph to either a post or a comment

use nestsync_core::{
    DataNode, EntityDef, Key, Messages, Pivot, Record, Relation, Rule, Schema, Store, SyncConfig,
    SyncEngine,
};
use nestsync_store::MemoryStore;
use nestsync_validate::RuleValidator;
use serde_json::{Map, Value};

/// Reaction kinds accepted by the blog schema.
pub const REACTION_KINDS: [&str; 3] = ["like", "love", "laugh"];

/// Builds the blog schema.
pub fn blog_schema() -> Schema {
    Schema::new()
        .with(
            EntityDef::new("posts")
                .relation("comments", Relation::has_many("comments", "post_id"))
                .relation("author", Relation::belongs_to("users", "author_id"))
                .relation(
                    "tags",
                    Relation::belongs_to_many("tags", "post_tag", "post_id", "tag_id"),
                )
                .relation("meta", Relation::has_one("post_meta", "post_id"))
                .relation("images", Relation::morph_many("images", "imageable"))
                .syncable([
                    "author",
                    "comments.author",
                    "comments.reactions",
                    "tags",
                    "meta",
                    "images",
                ])
                .fillable(["title", "body", "draft"])
                .rule(
                    "title",
                    [Rule::required_unless("_exists", true), Rule::String, Rule::Max(120.0)],
                )
                .messages(Messages::new().with("title.required_unless", "A post needs a title.")),
        )
        .with(
            EntityDef::new("comments")
                .relation("author", Relation::belongs_to("users", "author_id"))
                .relation("reactions", Relation::has_many("reactions", "comment_id"))
                .relation("images", Relation::morph_many("images", "imageable"))
                .order_by("position")
                .rule("body", [Rule::required_unless("_exists", true), Rule::String]),
        )
        .with(
            EntityDef::new("reactions")
                .rule("kind", [Rule::Required, Rule::one_of(REACTION_KINDS)]),
        )
        .with(EntityDef::new("users").rule("name", [Rule::String]))
        .with(EntityDef::new("tags"))
        .with(EntityDef::new("post_meta").rule("summary", [Rule::Nullable, Rule::String]))
        .with(
            EntityDef::new("images")
                .relation("imageable", Relation::morph_to("imageable"))
                .rule("url", [Rule::required_unless("_exists", true), Rule::String]),
        )
        .with_morph("post", "posts")
        .with_morph("comment", "comments")
}

/// The `post_tag` pivot of the blog schema.
pub fn post_tag() -> Pivot {
    Pivot {
        table: "post_tag".to_string(),
        foreign_pivot_key: "post_id".to_string(),
        related_pivot_key: "tag_id".to_string(),
    }
}

/// Converts a `json!` object into a data node.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn node(value: Value) -> DataNode {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// The blog schema over a fresh in-memory store.
pub struct TestBlog {
    /// The schema.
    pub schema: Schema,
    /// The store.
    pub store: MemoryStore,
}

impl TestBlog {
    /// Creates an empty blog.
    pub fn new() -> Self {
        Self {
            schema: blog_schema(),
            store: MemoryStore::new(),
        }
    }

    /// Runs `f` with a validating engine over this blog.
    pub fn with_engine<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SyncEngine<'_, MemoryStore>) -> R,
    {
        self.with_engine_config(SyncConfig::default(), f)
    }

    /// Runs `f` with a validating engine using `config`.
    pub fn with_engine_config<F, R>(&self, config: SyncConfig, f: F) -> R
    where
        F: FnOnce(&SyncEngine<'_, MemoryStore>) -> R,
    {
        let validator = RuleValidator::new(&self.store);
        let engine = SyncEngine::new(&self.schema, &self.store)
            .with_validator(&validator)
            .with_config(config);
        f(&engine)
    }

    /// Seeds a row of `entity_type`, returning its key.
    ///
    /// # Panics
    ///
    /// Panics if the row cannot be inserted.
    pub fn seed(&self, entity_type: &str, row: Value) -> Key {
        self.store
            .insert_row(entity_type, "id", node(row))
            .expect("Failed to seed row")
    }

    /// Links a post to a tag.
    pub fn seed_tag_link(&self, post: i64, tag: i64, extras: Value) {
        let extras = match extras {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.store
            .attach_row(&post_tag(), &Key::Int(post), &Key::Int(tag), extras);
    }

    /// Loads a stored record.
    ///
    /// # Panics
    ///
    /// Panics if the lookup fails or no row matches.
    pub fn load(&self, entity_type: &str, key: impl Into<Key>) -> Record {
        let key = key.into();
        self.store
            .find(entity_type, "id", &key)
            .expect("Failed to query store")
            .unwrap_or_else(|| panic!("no {entity_type} row with key {key}"))
    }

    /// Tags linked to `post`, sorted.
    pub fn tags_of(&self, post: i64) -> Vec<Key> {
        self.store.attached_keys(&post_tag(), &Key::Int(post))
    }

    /// Keys of rows of `entity_type` whose `column` equals `value`.
    pub fn keys_where(&self, entity_type: &str, column: &str, value: impl Into<Value>) -> Vec<Key> {
        let value = value.into();
        self.store
            .rows(entity_type)
            .iter()
            .filter(|row| row.get(column) == Some(&value))
            .filter_map(|row| Key::from_field(row, "id"))
            .collect()
    }
}

impl Default for TestBlog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestBlog {
    type Target = MemoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a fresh blog.
///
/// # Example
///
/// ```rust,ignore
/// use nestsync_testkit::with_blog;
///
/// #[test]
/// fn my_test() {
///     with_blog(|blog| {
///         blog.seed("users", json!({"id": 1, "name": "ada"}));
///         // ... sync operations
///     });
/// }
/// ```
pub fn with_blog<F, R>(f: F) -> R
where
    F: FnOnce(&TestBlog) -> R,
{
    let blog = TestBlog::new();
    f(&blog)
}

/// Pre-populated blogs.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// Post 1 with comments `1..=count`, positions descending.
    pub fn post_with_comments(count: i64) -> TestBlog {
        let blog = TestBlog::new();
        blog.seed("posts", json!({"id": 1, "title": "First"}));
        for id in 1..=count {
            blog.seed(
                "comments",
                json!({"id": id, "post_id": 1, "body": format!("comment {id}"), "position": count + 1 - id}),
            );
        }
        blog
    }

    /// Post 1 linked to tags `1..=count`, plus one unlinked extra tag.
    pub fn tagged_post(count: i64) -> TestBlog {
        let blog = TestBlog::new();
        blog.seed("posts", json!({"id": 1, "title": "First"}));
        for id in 1..=count + 1 {
            blog.seed("tags", json!({"id": id, "name": format!("tag {id}")}));
        }
        for id in 1..=count {
            blog.seed_tag_link(1, id, json!({"weight": 0}));
        }
        blog
    }

    /// Users 1 and 2.
    pub fn with_users() -> TestBlog {
        let blog = TestBlog::new();
        blog.seed("users", json!({"id": 1, "name": "ada"}));
        blog.seed("users", json!({"id": 2, "name": "grace"}));
        blog
    }
}
