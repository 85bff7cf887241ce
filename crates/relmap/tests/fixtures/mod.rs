//! Shared fixtures for relmap integration tests.
#![allow(dead_code)]

use relmap::prelude::*;
use relmap::{InsertOperation, RemoveOperation, UpdateOperation};

/// Blog model with the given cascade on `Post.comments`.
///
/// - `Post.author` (many-to-one User) cascades nothing
/// - `Post.tags` (owning many-to-many Tag) cascades insert
/// - `Comment.author` (many-to-one User) cascades insert
pub fn blog_registry_with(comments: Cascade) -> MetadataRegistry {
    let mut builder = MetadataBuilder::new();
    builder
        .register(
            TableDecl::new("User"),
            vec![ColumnDecl::primary("id"), ColumnDecl::new("name", SqlType::Text)],
            vec![],
        )
        .unwrap()
        .register(
            TableDecl::new("Post"),
            vec![
                ColumnDecl::primary("id"),
                ColumnDecl::new("title", SqlType::Text),
                ColumnDecl::new("createdAt", SqlType::Timestamp).create_date(true),
                ColumnDecl::new("updatedAt", SqlType::Timestamp).update_date(true),
            ],
            vec![
                RelationDecl::one_to_many("comments", "Comment", "post").cascade(comments),
                RelationDecl::many_to_one("author", "User"),
                RelationDecl::many_to_many("tags", "Tag")
                    .owning(true)
                    .inverse("posts")
                    .cascade_insert(),
            ],
        )
        .unwrap()
        .register(
            TableDecl::new("Comment"),
            vec![ColumnDecl::primary("id"), ColumnDecl::new("text", SqlType::Text)],
            vec![
                RelationDecl::many_to_one("post", "Post"),
                RelationDecl::many_to_one("author", "User").cascade_insert(),
            ],
        )
        .unwrap()
        .register(
            TableDecl::new("Tag"),
            vec![ColumnDecl::primary("id"), ColumnDecl::new("label", SqlType::Text)],
            vec![RelationDecl::many_to_many("posts", "Post").inverse("tags")],
        )
        .unwrap();
    builder.build_all().unwrap()
}

/// Blog model where `Post.comments` cascades insert and update.
pub fn blog_registry() -> MetadataRegistry {
    blog_registry_with(
        Cascade::NONE
            .with(CascadeOperation::Insert)
            .with(CascadeOperation::Update),
    )
}

pub fn row(pairs: Vec<(&str, Value)>) -> Row {
    Row::from_pairs(pairs)
}

/// Rows of `Post` left-joined with `comments` under the aliases
/// `post` and `post_comments`.
///
/// Post 1 has comments 10 and 11, the first one repeated; post 2 has none.
pub fn post_comment_rows() -> Vec<Row> {
    let joined = |post: i64, title: &str, comment: Option<(i64, &str)>| {
        let (id, text, fk) = match comment {
            Some((id, text)) => (Value::BigInt(id), Value::from(text), Value::BigInt(post)),
            None => (Value::Null, Value::Null, Value::Null),
        };
        row(vec![
            ("post_id", Value::BigInt(post)),
            ("post_title", Value::from(title)),
            ("post_comments_id", id),
            ("post_comments_text", text),
            ("post_comments_post_id", fk),
        ])
    };
    vec![
        joined(1, "A", Some((10, "first"))),
        joined(1, "A", Some((11, "second"))),
        joined(2, "B", None),
        joined(1, "A", Some((10, "first"))),
    ]
}

pub fn post(id: i64, title: &str) -> Entity {
    Entity::new("Post").with("id", id).with("title", title)
}

pub fn comment(id: Option<i64>, text: &str) -> Entity {
    Entity::new("Comment")
        .with("id", id.map_or(Value::Null, Value::BigInt))
        .with("text", text)
}

pub fn ids(entities: &[Entity]) -> Vec<i64> {
    entities
        .iter()
        .filter_map(|e| e.get("id").and_then(Value::as_i64))
        .collect()
}

/// Executor that records every call instead of touching a store.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub calls: Vec<String>,
}

impl PersistExecutor for RecordingExecutor {
    fn insert(&mut self, op: &InsertOperation) -> Result<()> {
        self.calls.push(format!("insert {}", op.entity.entity_name()));
        Ok(())
    }

    fn update(&mut self, op: &UpdateOperation) -> Result<()> {
        self.calls.push(format!(
            "update {} {:?}",
            op.entity.entity_name(),
            op.changed_columns
        ));
        Ok(())
    }

    fn remove(&mut self, op: &RemoveOperation) -> Result<()> {
        self.calls.push(format!("remove {}", op.identity));
        Ok(())
    }
}
