//! Fully merged metadata of a single entity.

use super::{ColumnMetadata, IndexMetadata, RelationKind, RelationMetadata, TableMetadata};
use crate::entity::Entity;
use crate::identity::PrimaryKey;
use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// Arena handle of an entity inside a [`MetadataRegistry`](super::MetadataRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    /// Position in the registry's arena.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One entity after inheritance merge and target resolution.
///
/// Columns, relations and indices are in declaration order: inherited
/// declarations first (most distant ancestor first), then the entity's own.
/// An override keeps the position of the declaration it replaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMetadata {
    pub id: EntityId,
    pub name: String,
    pub table: TableMetadata,
    pub columns: Vec<ColumnMetadata>,
    pub relations: Vec<RelationMetadata>,
    pub indices: Vec<IndexMetadata>,
}

impl EntityMetadata {
    /// Primary columns in declaration order.
    pub fn primary_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.is_primary)
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.is_primary)
    }

    pub fn column(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property == property)
    }

    pub fn relation(&self, property: &str) -> Option<&RelationMetadata> {
        self.relations.iter().find(|r| r.property == property)
    }

    /// Columns written by inserts and updates.
    pub fn persisted_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.is_persisted())
    }

    pub fn relations_of_kind(&self, kind: RelationKind) -> impl Iterator<Item = &RelationMetadata> {
        self.relations.iter().filter(move |r| r.kind == kind)
    }

    /// Relations whose key lives on this entity's side.
    pub fn owning_relations(&self) -> impl Iterator<Item = &RelationMetadata> {
        self.relations.iter().filter(|r| r.is_owning)
    }

    pub fn inverse_relations(&self) -> impl Iterator<Item = &RelationMetadata> {
        self.relations.iter().filter(|r| !r.is_owning)
    }

    /// Read an instance's primary key, in primary-column order.
    ///
    /// Missing primary values read as NULL.
    pub fn primary_key_of(&self, entity: &Entity) -> PrimaryKey {
        PrimaryKey::new(
            self.primary_columns()
                .map(|c| entity.get(&c.property).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::{
        ColumnDecl, MetadataBuilder, MetadataRegistry, RelationDecl, RelationKind, TableDecl,
    };
    use crate::types::SqlType;

    fn registry() -> MetadataRegistry {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![ColumnDecl::primary("id"), ColumnDecl::new("title", SqlType::Text)],
                vec![
                    RelationDecl::many_to_one("author", "User"),
                    RelationDecl::one_to_many("comments", "Comment", "post"),
                    RelationDecl::many_to_many("tags", "Tag").inverse("posts").owning(true),
                ],
            )
            .unwrap()
            .register(
                TableDecl::new("Comment"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::many_to_one("post", "Post")],
            )
            .unwrap()
            .register(TableDecl::new("User"), vec![ColumnDecl::primary("id")], vec![])
            .unwrap()
            .register(
                TableDecl::new("Tag"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::many_to_many("posts", "Post").inverse("tags")],
            )
            .unwrap();
        builder.build(&["Post"]).unwrap()
    }

    fn names<'a>(relations: impl Iterator<Item = &'a super::RelationMetadata>) -> Vec<&'a str> {
        relations.map(|r| r.property.as_str()).collect()
    }

    #[test]
    fn test_relations_partition_by_side_and_kind() {
        let registry = registry();
        let post = registry.find("Post").unwrap();

        assert_eq!(names(post.owning_relations()), vec!["author", "tags"]);
        assert_eq!(names(post.inverse_relations()), vec!["comments"]);
        assert_eq!(names(post.relations_of_kind(RelationKind::ManyToMany)), vec!["tags"]);
        assert!(post.relations_of_kind(RelationKind::OneToOne).next().is_none());

        let tag = registry.find("Tag").unwrap();
        assert_eq!(names(tag.inverse_relations()), vec!["posts"]);
    }

    #[test]
    fn test_primary_columns_and_persisted_columns() {
        let registry = registry();
        let post = registry.find("Post").unwrap();
        assert!(post.has_primary_key());
        let primary: Vec<&str> = post.primary_columns().map(|c| c.property.as_str()).collect();
        assert_eq!(primary, vec!["id"]);
        assert_eq!(post.persisted_columns().count(), 2);
        assert_eq!(post.column("title").unwrap().column_name, "title");
    }
}
