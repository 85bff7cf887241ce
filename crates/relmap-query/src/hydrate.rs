//! Join-result hydration.
//!
//! A joined query returns one flat row per combination of related entities,
//! so a post with three comments arrives as three rows repeating the post's
//! columns. The hydrator groups rows by each alias's primary key, projects
//! one entity per group and attaches related entities recursively, following
//! the alias tree.
//!
//! Column values are read under the `<alias><separator><column>` naming
//! convention, e.g. `post_title` with the default `_` separator.

use crate::alias::{Alias, AliasMap};
use relmap_core::{
    AliasError, EngineConfig, Entity, EntityMetadata, HydrationError, MetadataRegistry,
    PrimaryKey, Related, RelationKind, RelationMetadata, Result, Row, Value,
};
use std::collections::HashMap;

/// One deduplicated entity of an alias, with the rows it was built from.
#[derive(Debug)]
struct Node {
    entity: Entity,
    /// Indices into the full row slice, in row order
    rows: Vec<usize>,
}

/// Rebuilds nested entities from flat join rows.
#[derive(Debug, Clone)]
pub struct Hydrator<'a> {
    registry: &'a MetadataRegistry,
    config: EngineConfig,
}

impl<'a> Hydrator<'a> {
    /// Create a hydrator with the default configuration.
    pub fn new(registry: &'a MetadataRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: &'a MetadataRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hydrate root entities from `rows`.
    ///
    /// Roots come back deduplicated in first-seen row order. Relations
    /// without a child alias are left unset; relations with one are always
    /// loaded, possibly as `One(None)` or an empty list.
    #[tracing::instrument(level = "debug", skip_all, fields(rows = rows.len()))]
    pub fn hydrate(&self, rows: &[Row], aliases: &AliasMap) -> Result<Vec<Entity>> {
        let root = aliases.root().ok_or_else(|| AliasError {
            alias: String::new(),
            message: "alias map has no root alias".to_string(),
        })?;
        let subset: Vec<usize> = (0..rows.len()).collect();
        let nodes = self.build(rows, &subset, aliases, root)?;

        tracing::debug!(root = %root.name, entities = nodes.len(), "Hydrated root entities");
        Ok(nodes.into_iter().map(|n| n.entity).collect())
    }

    /// Build the deduplicated entities of `alias` from the rows in `subset`.
    fn build(
        &self,
        rows: &[Row],
        subset: &[usize],
        aliases: &AliasMap,
        alias: &Alias,
    ) -> Result<Vec<Node>> {
        let meta = self
            .registry
            .get(alias.entity)
            .filter(|meta| meta.name == alias.entity_name)
            .ok_or_else(|| AliasError {
                alias: alias.name.clone(),
                message: format!("entity {} is not part of this registry", alias.entity_name),
            })?;
        if !meta.has_primary_key() {
            return Err(HydrationError {
                alias: alias.name.clone(),
                entity: meta.name.clone(),
                message: "entity has no primary columns to group rows by".to_string(),
            }
            .into());
        }

        let groups = self.group_rows(rows, subset, alias, meta)?;
        tracing::trace!(
            alias = %alias.name,
            entity = %meta.name,
            rows = subset.len(),
            groups = groups.len(),
            "Grouped rows by primary key"
        );

        let mut nodes = Vec::with_capacity(groups.len());
        for group in groups {
            let representative = &rows[group[0]];
            let mut entity = self.project(representative, alias, meta);

            for relation in &meta.relations {
                let Some(child) = aliases.find_by_parent(&alias.name, &relation.property) else {
                    continue;
                };
                let candidates = self.build(rows, &group, aliases, child)?;
                let related =
                    self.attach(rows, representative, alias, &entity, relation, child, candidates);
                entity.set_relation(relation.property.clone(), related);
            }

            if !alias.is_root() && !entity.has_values() && !entity.has_related() {
                continue;
            }
            nodes.push(Node {
                entity,
                rows: group,
            });
        }
        Ok(nodes)
    }

    /// Partition rows by the alias's primary key, in first-seen order.
    ///
    /// Rows whose key is entirely NULL (an unmatched outer join) are dropped,
    /// except for the root alias.
    fn group_rows(
        &self,
        rows: &[Row],
        subset: &[usize],
        alias: &Alias,
        meta: &EntityMetadata,
    ) -> Result<Vec<Vec<usize>>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut index: HashMap<PrimaryKey, usize> = HashMap::new();

        for &row_index in subset {
            let row = &rows[row_index];
            let mut parts = Vec::new();
            for column in meta.primary_columns() {
                let value = self.read(row, &alias.name, &column.column_name).ok_or_else(|| {
                    HydrationError {
                        alias: alias.name.clone(),
                        entity: meta.name.clone(),
                        message: format!(
                            "primary column '{}' was not selected",
                            self.column_key(&alias.name, &column.column_name)
                        ),
                    }
                })?;
                parts.push(value.clone());
            }
            let key = PrimaryKey::new(parts);
            if key.is_null() && !alias.is_root() {
                continue;
            }
            match index.get(&key) {
                Some(&g) => groups[g].push(row_index),
                None => {
                    index.insert(key, groups.len());
                    groups.push(vec![row_index]);
                }
            }
        }
        Ok(groups)
    }

    /// Project every selected, non-virtual, non-null column into a new entity.
    fn project(&self, row: &Row, alias: &Alias, meta: &EntityMetadata) -> Entity {
        let mut entity = Entity::new(meta.name.clone());
        for column in meta.persisted_columns() {
            let value = self
                .read(row, &alias.name, &column.column_name)
                .filter(|v| !v.is_null());
            if let Some(value) = value {
                entity.set(column.property.clone(), value.clone());
            }
        }
        entity
    }

    /// Pick the candidates that belong to one parent entity.
    #[allow(clippy::too_many_arguments)]
    fn attach(
        &self,
        rows: &[Row],
        representative: &Row,
        alias: &Alias,
        parent: &Entity,
        relation: &RelationMetadata,
        child: &Alias,
        candidates: Vec<Node>,
    ) -> Related {
        if relation.is_owning_to_one() {
            return self.attach_owning_to_one(representative, alias, relation, child, candidates);
        }

        // The key lives on the child side: filter by the inverse join columns.
        let inverse_columns = self
            .registry
            .inverse_of(relation)
            .filter(|inverse| inverse.is_owning_to_one())
            .map(|inverse| inverse.join_columns.as_slice())
            .unwrap_or_default();

        let mut matched: Vec<Entity> = Vec::new();
        for node in candidates {
            let keep = if inverse_columns.is_empty() {
                true
            } else {
                let child_row = &rows[node.rows[0]];
                let foreign: Option<Vec<Value>> = inverse_columns
                    .iter()
                    .map(|jc| self.read(child_row, &child.name, &jc.name).cloned())
                    .collect();
                match foreign {
                    // Inverse key not selected: co-occurrence decides.
                    None => true,
                    Some(foreign) => {
                        let referenced = inverse_columns
                            .iter()
                            .map(|jc| {
                                parent
                                    .get(&jc.referenced_property)
                                    .cloned()
                                    .unwrap_or(Value::Null)
                            })
                            .collect();
                        PrimaryKey::new(foreign) == PrimaryKey::new(referenced)
                    }
                }
            };
            if keep {
                matched.push(node.entity);
            }
        }

        match relation.kind {
            RelationKind::OneToMany | RelationKind::ManyToMany => Related::Many(matched),
            RelationKind::OneToOne | RelationKind::ManyToOne => {
                if matched.len() > 1 {
                    tracing::warn!(
                        alias = %child.name,
                        relation = %relation.property,
                        candidates = matched.len(),
                        "Several candidates for a to-one relation, keeping the first"
                    );
                }
                Related::One(matched.into_iter().next().map(Box::new))
            }
        }
    }

    /// Many-to-one or owning one-to-one: match the foreign key on the parent row.
    fn attach_owning_to_one(
        &self,
        representative: &Row,
        alias: &Alias,
        relation: &RelationMetadata,
        child: &Alias,
        candidates: Vec<Node>,
    ) -> Related {
        let foreign: Option<Vec<Value>> = relation
            .join_columns
            .iter()
            .map(|jc| self.read(representative, &alias.name, &jc.name).cloned())
            .collect();

        let Some(foreign) = foreign.filter(|f| !f.is_empty()) else {
            // Join columns not selected: fall back to co-occurrence.
            if candidates.len() > 1 {
                tracing::warn!(
                    alias = %child.name,
                    relation = %relation.property,
                    candidates = candidates.len(),
                    "Several candidates for a to-one relation, keeping the first"
                );
            }
            return Related::One(candidates.into_iter().next().map(|n| Box::new(n.entity)));
        };

        let foreign = PrimaryKey::new(foreign);
        if foreign.is_null() {
            return Related::One(None);
        }
        let found = candidates.into_iter().find(|node| {
            let referenced = relation
                .join_columns
                .iter()
                .map(|jc| {
                    node.entity
                        .get(&jc.referenced_property)
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect();
            PrimaryKey::new(referenced) == foreign
        });
        Related::One(found.map(|n| Box::new(n.entity)))
    }

    fn read<'r>(&self, row: &'r Row, alias: &str, column: &str) -> Option<&'r Value> {
        row.get_aliased(alias, &self.config.column_separator, column)
    }

    fn column_key(&self, alias: &str, column: &str) -> String {
        format!("{}{}{}", alias, self.config.column_separator, column)
    }
}
