//! Registration of raw declarations and the build into a frozen registry.
//!
//! Building happens in three passes:
//!
//! 1. Collect the requested entities plus every relation target they reach,
//!    assigning arena handles and merging inherited declarations.
//! 2. Resolve names (naming strategy), join columns and join tables.
//! 3. Validate cross-entity invariants (inverse sides, owning pairs).

use super::naming::{DefaultNamingStrategy, NamingStrategy};
use super::{
    ColumnDecl, ColumnMetadata, EntityId, EntityMetadata, IndexDecl, IndexMetadata, JoinColumn,
    MetadataRegistry, RelationDecl, RelationKind, RelationMetadata, TableDecl, TableKind,
    TableMetadata,
};
use crate::error::{MetadataError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Raw declarations of one registered type.
#[derive(Debug, Clone)]
struct EntityDecl {
    table: TableDecl,
    columns: Vec<ColumnDecl>,
    relations: Vec<RelationDecl>,
    indices: Vec<IndexDecl>,
}

/// Declarations of one entity after inheritance merge.
#[derive(Debug)]
struct MergedEntity {
    table: TableMetadata,
    columns: Vec<ColumnDecl>,
    relations: Vec<RelationDecl>,
    indices: Vec<IndexDecl>,
}

/// Collects declarations and builds a [`MetadataRegistry`].
///
/// # Example
///
/// ```
/// use relmap_core::SqlType;
/// use relmap_core::metadata::{ColumnDecl, MetadataBuilder, RelationDecl, TableDecl};
///
/// let mut builder = MetadataBuilder::new();
/// builder.register(
///     TableDecl::new("Post"),
///     vec![ColumnDecl::primary("id"), ColumnDecl::new("title", SqlType::Text)],
///     vec![RelationDecl::one_to_many("comments", "Comment", "post").cascade_insert()],
/// )?;
/// builder.register(
///     TableDecl::new("Comment"),
///     vec![ColumnDecl::primary("id"), ColumnDecl::new("text", SqlType::Text)],
///     vec![RelationDecl::many_to_one("post", "Post")],
/// )?;
///
/// // `Comment` is built too, because `Post.comments` targets it.
/// let registry = builder.build(&["Post"])?;
/// assert_eq!(registry.find("comment")?.name, "Comment");
/// # Ok::<(), relmap_core::Error>(())
/// ```
#[derive(Debug)]
pub struct MetadataBuilder {
    naming: Arc<dyn NamingStrategy>,
    decls: HashMap<String, EntityDecl>,
    /// Registration order, for deterministic `build_all`
    order: Vec<String>,
    /// Concrete table name -> entity that maps it
    tables: HashMap<String, String>,
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataBuilder {
    /// Create a builder using [`DefaultNamingStrategy`].
    pub fn new() -> Self {
        Self {
            naming: Arc::new(DefaultNamingStrategy),
            decls: HashMap::new(),
            order: Vec::new(),
            tables: HashMap::new(),
        }
    }

    /// Replace the naming strategy. Set it before registering anything.
    pub fn with_naming_strategy(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn naming_strategy(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    /// Store the declarations of one type.
    ///
    /// Fails when the type is already registered, when one property is
    /// declared twice (as columns, relations or one of each), or when a
    /// concrete table name is already mapped by another type.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %table.entity))]
    pub fn register(
        &mut self,
        table: TableDecl,
        columns: Vec<ColumnDecl>,
        relations: Vec<RelationDecl>,
    ) -> Result<&mut Self> {
        let entity = table.entity.clone();
        if self.decls.contains_key(&entity) {
            return Err(
                MetadataError::duplicate(&entity, None, "entity is already registered").into(),
            );
        }

        let mut seen = HashSet::new();
        let properties = columns
            .iter()
            .map(|c| c.property.as_str())
            .chain(relations.iter().map(|r| r.property.as_str()));
        for property in properties {
            if !seen.insert(property) {
                return Err(MetadataError::duplicate(
                    &entity,
                    Some(property),
                    "property already has column or relation metadata",
                )
                .into());
            }
        }

        // Single-table children share their parent's table on purpose.
        if matches!(table.kind, TableKind::Regular | TableKind::Closure) {
            let table_name = self.own_table_name(&table);
            if let Some(other) = self.tables.get(&table_name) {
                return Err(MetadataError::duplicate(
                    &entity,
                    None,
                    format!("table '{}' is already mapped by {}", table_name, other),
                )
                .into());
            }
            self.tables.insert(table_name, entity.clone());
        }

        tracing::debug!(
            columns = columns.len(),
            relations = relations.len(),
            kind = table.kind.as_str(),
            "Registered entity declarations"
        );
        self.order.push(entity.clone());
        self.decls.insert(
            entity,
            EntityDecl {
                table,
                columns,
                relations,
                indices: Vec::new(),
            },
        );
        Ok(self)
    }

    /// Add index declarations to a registered type.
    pub fn register_indices(&mut self, entity: &str, indices: Vec<IndexDecl>) -> Result<&mut Self> {
        let decl = self
            .decls
            .get_mut(entity)
            .ok_or_else(|| MetadataError::not_found(entity))?;
        for index in indices {
            if decl.indices.iter().any(|i| i.name == index.name) {
                return Err(MetadataError::duplicate(
                    entity,
                    None,
                    format!("index '{}' is declared twice", index.name),
                )
                .into());
            }
            decl.indices.push(index);
        }
        Ok(self)
    }

    /// Whether a type with this name has been registered.
    pub fn is_registered(&self, entity: &str) -> bool {
        self.decls.contains_key(entity)
    }

    /// Build every registered concrete type.
    pub fn build_all(&self) -> Result<MetadataRegistry> {
        let concrete: Vec<&str> = self
            .order
            .iter()
            .filter(|name| {
                self.decls
                    .get(*name)
                    .is_some_and(|d| d.table.kind.is_concrete())
            })
            .map(String::as_str)
            .collect();
        self.build(&concrete)
    }

    /// Build the requested types, plus every type their relations reach.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn build(&self, types: &[&str]) -> Result<MetadataRegistry> {
        // Pass 1: arena handles and inheritance merge.
        let mut ids: HashMap<String, EntityId> = HashMap::new();
        let mut merged: Vec<MergedEntity> = Vec::new();
        let mut queue: VecDeque<String> = types.iter().map(|t| (*t).to_string()).collect();

        while let Some(name) = queue.pop_front() {
            if ids.contains_key(&name) {
                continue;
            }
            let decl = self.decl(&name)?;
            if !decl.table.kind.is_concrete() {
                return Err(MetadataError::invalid(
                    &name,
                    None,
                    format!("{} types cannot be built as entities", decl.table.kind.as_str()),
                )
                .into());
            }

            let entity = self.merge(decl)?;
            for relation in &entity.relations {
                let target = self.decls.get(&relation.target).ok_or_else(|| {
                    MetadataError::invalid(
                        &name,
                        Some(relation.property.as_str()),
                        format!("relation targets unknown entity '{}'", relation.target),
                    )
                })?;
                if !target.table.kind.is_concrete() {
                    return Err(MetadataError::invalid(
                        &name,
                        Some(relation.property.as_str()),
                        format!(
                            "relation targets {} type '{}'",
                            target.table.kind.as_str(),
                            relation.target
                        ),
                    )
                    .into());
                }
                if !ids.contains_key(&relation.target) {
                    queue.push_back(relation.target.clone());
                }
            }

            ids.insert(name, EntityId(merged.len()));
            merged.push(entity);
        }

        // Pass 2: resolved columns first, since join columns read target keys.
        let mut columns: Vec<Vec<ColumnMetadata>> = Vec::with_capacity(merged.len());
        for entity in &merged {
            columns.push(self.resolve_columns(entity)?);
        }

        // Relations and indices read target columns, so resolve them all before
        // any column list moves into the arena.
        let mut resolved = Vec::with_capacity(merged.len());
        for (index, entity) in merged.iter().enumerate() {
            let mut relations = Vec::with_capacity(entity.relations.len());
            for decl in &entity.relations {
                let target = ids[&decl.target];
                relations.push(self.resolve_relation(
                    entity,
                    decl,
                    target,
                    &merged[target.0],
                    &columns[target.0],
                )?);
            }
            let indices = resolve_indices(entity, &columns[index])?;
            resolved.push((relations, indices));
        }

        let mut arena = Vec::with_capacity(merged.len());
        for (index, ((entity, columns), (relations, indices))) in
            merged.iter().zip(columns).zip(resolved).enumerate()
        {
            tracing::debug!(
                entity = %entity.table.entity,
                table = %entity.table.name,
                columns = columns.len(),
                relations = relations.len(),
                "Built entity metadata"
            );
            arena.push(EntityMetadata {
                id: EntityId(index),
                name: entity.table.entity.clone(),
                table: entity.table.clone(),
                columns,
                relations,
                indices,
            });
        }

        // Pass 3: invariants spanning both sides of a relation.
        let registry = MetadataRegistry::from_arena(arena);
        validate_inverse_sides(&registry)?;

        tracing::debug!(entities = registry.len(), "Metadata registry built");
        Ok(registry)
    }

    fn decl(&self, entity: &str) -> Result<&EntityDecl> {
        self.decls
            .get(entity)
            .ok_or_else(|| MetadataError::not_found(entity).into())
    }

    fn own_table_name(&self, table: &TableDecl) -> String {
        table
            .name
            .clone()
            .unwrap_or_else(|| self.naming.table_name(&table.entity))
    }

    /// Ancestor declarations, nearest first.
    fn ancestors<'a>(&'a self, decl: &'a EntityDecl) -> Result<Vec<&'a EntityDecl>> {
        let mut chain: Vec<&EntityDecl> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([decl.table.entity.as_str()]);
        let mut current = decl;
        while let Some(parent) = current.table.extends.as_deref() {
            if !visited.insert(parent) {
                return Err(MetadataError::invalid(
                    &decl.table.entity,
                    None,
                    format!("inheritance cycle through '{}'", parent),
                )
                .into());
            }
            current = self.decl(parent)?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// Merge inherited declarations into one entity.
    ///
    /// Abstract and embeddable ancestors always contribute. A concrete
    /// ancestor contributes only to the single-table child directly below it.
    /// The most distant ancestor is applied first so that nearer declarations
    /// replace farther ones, keeping the replaced declaration's position.
    fn merge(&self, decl: &EntityDecl) -> Result<MergedEntity> {
        let chain = self.ancestors(decl)?;

        let mut contributors = Vec::new();
        let mut child_kind = decl.table.kind;
        for ancestor in &chain {
            let kind = ancestor.table.kind;
            if !kind.is_concrete() || child_kind == TableKind::SingleTableChild {
                contributors.push(*ancestor);
            }
            child_kind = kind;
        }

        let table_name = if decl.table.kind == TableKind::SingleTableChild {
            let root = chain
                .iter()
                .find(|a| a.table.kind.is_concrete() && a.table.kind != TableKind::SingleTableChild)
                .ok_or_else(|| {
                    MetadataError::invalid(
                        &decl.table.entity,
                        None,
                        "single-table child must extend a concrete entity",
                    )
                })?;
            self.own_table_name(&root.table)
        } else {
            self.own_table_name(&decl.table)
        };

        let mut columns: Vec<ColumnDecl> = Vec::new();
        let mut relations: Vec<RelationDecl> = Vec::new();
        let mut indices: Vec<IndexDecl> = Vec::new();
        for source in contributors.iter().rev().copied().chain(std::iter::once(decl)) {
            for column in &source.columns {
                relations.retain(|r| r.property != column.property);
                upsert(&mut columns, column.clone(), |c| &c.property);
            }
            for relation in &source.relations {
                columns.retain(|c| c.property != relation.property);
                upsert(&mut relations, relation.clone(), |r| &r.property);
            }
            for index in &source.indices {
                upsert(&mut indices, index.clone(), |i| &i.name);
            }
        }

        tracing::trace!(
            entity = %decl.table.entity,
            inherited_from = contributors.len(),
            "Merged inherited declarations"
        );

        Ok(MergedEntity {
            table: TableMetadata {
                entity: decl.table.entity.clone(),
                name: table_name,
                kind: decl.table.kind,
                ancestors: chain.iter().map(|a| a.table.entity.clone()).collect(),
            },
            columns,
            relations,
            indices,
        })
    }

    fn resolve_columns(&self, entity: &MergedEntity) -> Result<Vec<ColumnMetadata>> {
        let name = &entity.table.entity;
        let mut resolved = Vec::with_capacity(entity.columns.len());
        for decl in &entity.columns {
            if (decl.create_date || decl.update_date) && !decl.sql_type.is_temporal() {
                return Err(MetadataError::invalid(
                    name,
                    Some(decl.property.as_str()),
                    format!("date column must have a temporal type, found {}", decl.sql_type),
                )
                .into());
            }
            if decl.primary_key && decl.nullable {
                return Err(MetadataError::invalid(
                    name,
                    Some(decl.property.as_str()),
                    "primary column must not be nullable",
                )
                .into());
            }
            let column_name = decl
                .column_name
                .clone()
                .unwrap_or_else(|| self.naming.column_name(&decl.property));
            resolved.push(ColumnMetadata::from_decl(name, decl, column_name));
        }

        if !resolved.iter().any(|c| c.is_primary) {
            return Err(MetadataError::invalid(name, None, "entity has no primary column").into());
        }
        Ok(resolved)
    }

    fn resolve_relation(
        &self,
        entity: &MergedEntity,
        decl: &RelationDecl,
        target: EntityId,
        target_entity: &MergedEntity,
        target_columns: &[ColumnMetadata],
    ) -> Result<RelationMetadata> {
        let name = &entity.table.entity;
        let property = Some(decl.property.as_str());
        let invalid = |message: &str| MetadataError::invalid(name, property, message);

        match (decl.kind, decl.owning) {
            (RelationKind::ManyToOne, Some(false)) => {
                return Err(invalid("many-to-one relations always own the foreign key").into());
            }
            (RelationKind::OneToMany, Some(true)) => {
                return Err(invalid("one-to-many relations are never owning").into());
            }
            _ => {}
        }
        let is_owning = decl.resolved_owning();
        let to_one = !decl.kind.is_collection();

        let join_columns = if is_owning && to_one {
            if decl.join_columns.is_empty() {
                target_columns
                    .iter()
                    .filter(|c| c.is_primary)
                    .map(|pk| {
                        JoinColumn::new(
                            self.naming.join_column_name(&decl.property, &pk.column_name),
                            pk.property.clone(),
                        )
                    })
                    .collect()
            } else {
                for join in &decl.join_columns {
                    if !target_columns
                        .iter()
                        .any(|c| c.property == join.referenced_property)
                    {
                        return Err(invalid(&format!(
                            "join column '{}' references unknown property '{}' of {}",
                            join.name, join.referenced_property, decl.target
                        ))
                        .into());
                    }
                }
                decl.join_columns.clone()
            }
        } else if decl.join_columns.is_empty() {
            Vec::new()
        } else {
            return Err(
                invalid("join columns belong on the owning side of a to-one relation").into(),
            );
        };

        let join_table = if is_owning && decl.kind == RelationKind::ManyToMany {
            Some(decl.join_table.clone().unwrap_or_else(|| {
                self.naming
                    .join_table_name(&entity.table.name, &decl.property, &target_entity.table.name)
            }))
        } else if decl.join_table.is_some() {
            return Err(invalid("join tables belong on the owning side of a many-to-many").into());
        } else {
            None
        };

        Ok(RelationMetadata {
            entity: name.clone(),
            property: decl.property.clone(),
            kind: decl.kind,
            target,
            target_name: decl.target.clone(),
            is_owning,
            inverse: decl.inverse.clone(),
            cascade: decl.cascade,
            is_nullable: decl.nullable,
            join_columns,
            join_table,
        })
    }
}

/// Replace the item with the same key in place, or append it.
fn upsert<T>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> &String) {
    match items.iter().position(|existing| key(existing) == key(&item)) {
        Some(pos) => items[pos] = item,
        None => items.push(item),
    }
}

fn resolve_indices(
    entity: &MergedEntity,
    columns: &[ColumnMetadata],
) -> Result<Vec<IndexMetadata>> {
    let name = &entity.table.entity;
    entity
        .indices
        .iter()
        .map(|index| {
            if let Some(missing) = index
                .columns
                .iter()
                .find(|p| !columns.iter().any(|c| &c.property == *p))
            {
                return Err(MetadataError::invalid(
                    name,
                    Some(missing.as_str()),
                    format!("index '{}' references an unknown column", index.name),
                )
                .into());
            }
            Ok(IndexMetadata {
                entity: name.clone(),
                name: index.name.clone(),
                columns: index.columns.clone(),
                is_unique: index.unique,
            })
        })
        .collect()
}

fn validate_inverse_sides(registry: &MetadataRegistry) -> Result<()> {
    for entity in registry.entities() {
        for relation in &entity.relations {
            let Some(inverse_name) = relation.inverse.as_deref() else {
                continue;
            };
            let target = registry.relation_target(relation);
            let Some(inverse) = target.relation(inverse_name) else {
                return Err(MetadataError::invalid(
                    &entity.name,
                    Some(relation.property.as_str()),
                    format!("inverse side '{}.{}' does not exist", target.name, inverse_name),
                )
                .into());
            };
            if inverse.kind != relation.kind.inverse_kind() {
                return Err(MetadataError::invalid(
                    &entity.name,
                    Some(relation.property.as_str()),
                    format!(
                        "{} relation cannot pair with {} inverse '{}.{}'",
                        relation.kind, inverse.kind, target.name, inverse_name
                    ),
                )
                .into());
            }
            let paired = matches!(relation.kind, RelationKind::OneToOne | RelationKind::ManyToMany);
            if paired && relation.is_owning == inverse.is_owning {
                return Err(MetadataError::invalid(
                    &entity.name,
                    Some(relation.property.as_str()),
                    format!(
                        "exactly one side of {} pair with '{}.{}' must be owning",
                        relation.kind, target.name, inverse_name
                    ),
                )
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, MetadataErrorKind};
    use crate::metadata::Cascade;
    use crate::types::SqlType;

    fn post_and_comment() -> MetadataBuilder {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![
                    ColumnDecl::primary("id"),
                    ColumnDecl::new("title", SqlType::Text),
                ],
                vec![RelationDecl::one_to_many("comments", "Comment", "post").cascade_insert()],
            )
            .unwrap()
            .register(
                TableDecl::new("Comment"),
                vec![
                    ColumnDecl::primary("id"),
                    ColumnDecl::new("text", SqlType::Text),
                ],
                vec![RelationDecl::many_to_one("post", "Post")],
            )
            .unwrap();
        builder
    }

    fn invalid_kind(err: &Error) -> Option<MetadataErrorKind> {
        match err {
            Error::Metadata(m) => Some(m.kind),
            _ => None,
        }
    }

    #[test]
    fn test_duplicate_property_in_one_declaration() {
        let mut builder = MetadataBuilder::new();
        let err = builder
            .register(
                TableDecl::new("Post"),
                vec![ColumnDecl::primary("id"), ColumnDecl::new("author", SqlType::Text)],
                vec![RelationDecl::many_to_one("author", "User")],
            )
            .unwrap_err();
        assert!(err.is_duplicate_metadata());
        assert!(err.to_string().contains("Post.author"));
    }

    #[test]
    fn test_duplicate_registration_and_table_collision() {
        let mut builder = post_and_comment();
        let again = builder
            .register(TableDecl::new("Post"), vec![ColumnDecl::primary("id")], vec![])
            .unwrap_err();
        assert!(again.is_duplicate_metadata());

        let collision = builder
            .register(
                TableDecl::new("Article").name("post"),
                vec![ColumnDecl::primary("id")],
                vec![],
            )
            .unwrap_err();
        assert!(collision.is_duplicate_metadata());
        assert!(collision.to_string().contains("table 'post'"));
    }

    #[test]
    fn test_build_resolves_targets_transitively() {
        let registry = post_and_comment().build(&["Post"]).unwrap();
        assert_eq!(registry.len(), 2);

        let post = registry.find("Post").unwrap();
        let comments = post.relation("comments").unwrap();
        assert_eq!(registry.relation_target(comments).name, "Comment");
        assert!(!comments.is_owning);

        let comment = registry.find("Comment").unwrap();
        let back = comment.relation("post").unwrap();
        assert!(back.is_owning);
        assert_eq!(back.join_columns, vec![JoinColumn::new("post_id", "id")]);
        assert_eq!(registry.inverse_of(comments).map(|r| r.property.as_str()), Some("post"));
    }

    #[test]
    fn test_explicit_join_columns_see_earlier_targets() {
        // Post enters the arena before Comment, whose relation points back at it.
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![ColumnDecl::primary("id"), ColumnDecl::new("slug", SqlType::Text)],
                vec![],
            )
            .unwrap()
            .register(
                TableDecl::new("Comment"),
                vec![ColumnDecl::primary("id")],
                vec![
                    RelationDecl::many_to_one("post", "Post").join_column("post_ref", "id"),
                    RelationDecl::many_to_one("pinned", "Post").join_column("pinned_slug", "slug"),
                ],
            )
            .unwrap();
        let registry = builder.build_all().unwrap();

        let comment = registry.find("Comment").unwrap();
        assert_eq!(
            comment.relation("post").unwrap().join_columns,
            vec![JoinColumn::new("post_ref", "id")]
        );
        assert_eq!(
            comment.relation("pinned").unwrap().join_columns,
            vec![JoinColumn::new("pinned_slug", "slug")]
        );
        assert_eq!(registry.find("Post").unwrap().columns.len(), 2);
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let err = post_and_comment().build(&["Ghost"]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_inheritance_precedence() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::abstract_base("Base"),
                vec![
                    ColumnDecl::primary("id"),
                    ColumnDecl::new("name", SqlType::VarChar(50)),
                    ColumnDecl::new("createdAt", SqlType::Timestamp).create_date(true),
                ],
                vec![],
            )
            .unwrap()
            .register(
                TableDecl::new("Child").extends("Base"),
                vec![
                    ColumnDecl::new("name", SqlType::Text).nullable(true),
                    ColumnDecl::new("extra", SqlType::Integer),
                ],
                vec![],
            )
            .unwrap();

        let registry = builder.build(&["Child"]).unwrap();
        let child = registry.find("Child").unwrap();
        let props: Vec<&str> = child.columns.iter().map(|c| c.property.as_str()).collect();
        assert_eq!(props, vec!["id", "name", "createdAt", "extra"]);

        let name = child.column("name").unwrap();
        assert_eq!(name.sql_type, SqlType::Text);
        assert!(name.is_nullable);
        assert_eq!(name.entity, "Child");
        assert_eq!(child.table.ancestors, vec!["Base".to_string()]);
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::abstract_base("Root"),
                vec![
                    ColumnDecl::primary("id"),
                    ColumnDecl::new("label", SqlType::Integer),
                ],
                vec![],
            )
            .unwrap()
            .register(
                TableDecl::abstract_base("Middle").extends("Root"),
                vec![ColumnDecl::new("label", SqlType::Text)],
                vec![],
            )
            .unwrap()
            .register(TableDecl::new("Leaf").extends("Middle"), vec![], vec![])
            .unwrap();

        let registry = builder.build(&["Leaf"]).unwrap();
        let leaf = registry.find("Leaf").unwrap();
        assert_eq!(leaf.column("label").unwrap().sql_type, SqlType::Text);
        assert_eq!(leaf.table.ancestors, vec!["Middle".to_string(), "Root".to_string()]);
    }

    #[test]
    fn test_single_table_child_uses_parent_table() {
        let mut builder = post_and_comment();
        builder
            .register(
                TableDecl::single_table_child("FeaturedPost", "Post"),
                vec![ColumnDecl::new("banner", SqlType::Text).nullable(true)],
                vec![],
            )
            .unwrap();

        let registry = builder.build_all().unwrap();
        let featured = registry.find("FeaturedPost").unwrap();
        assert_eq!(featured.table.name, "post");
        assert!(featured.column("title").is_some());
        assert!(featured.relation("comments").is_some());
        // Table lookups keep resolving to the table's root entity.
        assert_eq!(registry.find("post").unwrap().name, "Post");
    }

    #[test]
    fn test_missing_primary_key_is_invalid() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(TableDecl::new("Log"), vec![ColumnDecl::new("line", SqlType::Text)], vec![])
            .unwrap();
        let err = builder.build(&["Log"]).unwrap_err();
        assert_eq!(invalid_kind(&err), Some(MetadataErrorKind::Invalid));
    }

    #[test]
    fn test_relation_to_abstract_is_invalid() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(TableDecl::abstract_base("Base"), vec![ColumnDecl::primary("id")], vec![])
            .unwrap()
            .register(
                TableDecl::new("Thing"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::many_to_one("base", "Base")],
            )
            .unwrap();
        let err = builder.build(&["Thing"]).unwrap_err();
        assert_eq!(invalid_kind(&err), Some(MetadataErrorKind::Invalid));
        assert!(err.to_string().contains("Thing.base"));
    }

    #[test]
    fn test_owning_side_rules() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("User"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::one_to_one("profile", "Profile").inverse("user")],
            )
            .unwrap()
            .register(
                TableDecl::new("Profile"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::one_to_one("user", "User").inverse("profile")],
            )
            .unwrap();
        let err = builder.build_all().unwrap_err();
        assert!(err.to_string().contains("must be owning"));

        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::one_to_many("comments", "Comment", "post").owning(true)],
            )
            .unwrap()
            .register(
                TableDecl::new("Comment"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::many_to_one("post", "Post")],
            )
            .unwrap();
        let err = builder.build_all().unwrap_err();
        assert!(err.to_string().contains("never owning"));
    }

    #[test]
    fn test_missing_inverse_is_invalid() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::one_to_many("comments", "Comment", "article")],
            )
            .unwrap()
            .register(TableDecl::new("Comment"), vec![ColumnDecl::primary("id")], vec![])
            .unwrap();
        let err = builder.build(&["Post"]).unwrap_err();
        assert!(err.to_string().contains("'Comment.article' does not exist"));
    }

    #[test]
    fn test_many_to_many_join_table_and_composite_join_columns() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![ColumnDecl::primary("id")],
                vec![
                    RelationDecl::many_to_many("tags", "Tag")
                        .inverse("posts")
                        .owning(true)
                        .cascade(Cascade::ALL),
                ],
            )
            .unwrap()
            .register(
                TableDecl::new("Tag"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::many_to_many("posts", "Post").inverse("tags")],
            )
            .unwrap()
            .register(
                TableDecl::new("Shelf"),
                vec![
                    ColumnDecl::new("room", SqlType::Text).primary_key(true),
                    ColumnDecl::new("slot", SqlType::Integer).primary_key(true),
                ],
                vec![],
            )
            .unwrap()
            .register(
                TableDecl::new("Book"),
                vec![ColumnDecl::primary("id")],
                vec![RelationDecl::many_to_one("shelf", "Shelf")],
            )
            .unwrap();

        let registry = builder.build_all().unwrap();
        let tags = registry.find("Post").unwrap().relation("tags").unwrap();
        assert_eq!(tags.join_table.as_deref(), Some("post_tags_tag"));
        assert!(registry.find("Tag").unwrap().relation("posts").unwrap().join_table.is_none());

        let shelf = registry.find("Book").unwrap().relation("shelf").unwrap();
        assert_eq!(
            shelf.join_columns,
            vec![JoinColumn::new("shelf_room", "room"), JoinColumn::new("shelf_slot", "slot")]
        );
    }

    #[test]
    fn test_date_columns_need_temporal_type() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::new("Post"),
                vec![
                    ColumnDecl::primary("id"),
                    ColumnDecl::new("createdAt", SqlType::Text).create_date(true),
                ],
                vec![],
            )
            .unwrap();
        let err = builder.build_all().unwrap_err();
        assert!(err.to_string().contains("temporal"));
    }

    #[test]
    fn test_indices_merge_by_name() {
        let mut builder = MetadataBuilder::new();
        builder
            .register(
                TableDecl::abstract_base("Named"),
                vec![ColumnDecl::primary("id"), ColumnDecl::new("name", SqlType::Text)],
                vec![],
            )
            .unwrap()
            .register_indices("Named", vec![IndexDecl::new("idx_name", ["name"])])
            .unwrap()
            .register(
                TableDecl::new("Tag").extends("Named"),
                vec![ColumnDecl::new("slug", SqlType::Text)],
                vec![],
            )
            .unwrap()
            .register_indices(
                "Tag",
                vec![IndexDecl::new("idx_name", ["name", "slug"]).unique(true)],
            )
            .unwrap();

        let registry = builder.build_all().unwrap();
        let tag = registry.find("Tag").unwrap();
        assert_eq!(tag.indices.len(), 1);
        assert!(tag.indices[0].is_unique);
        assert_eq!(tag.indices[0].columns, vec!["name".to_string(), "slug".to_string()]);

        let err = builder.register_indices("Ghost", vec![]).unwrap_err();
        assert!(err.is_not_found());
    }
}
