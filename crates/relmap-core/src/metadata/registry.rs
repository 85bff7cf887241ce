//! The frozen metadata registry.

use super::{EntityId, EntityMetadata, RelationMetadata, TableKind};
use crate::error::{MetadataError, Result};
use std::collections::HashMap;

/// Every built entity, indexed by entity name and table name.
///
/// Produced by [`MetadataBuilder::build`](super::MetadataBuilder::build) and
/// immutable afterwards. Share it behind an `Arc` across hydration and
/// planning calls.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: Vec<EntityMetadata>,
    by_name: HashMap<String, EntityId>,
    by_table: HashMap<String, EntityId>,
}

impl MetadataRegistry {
    /// Freeze an arena of built entities. Each `id` must equal its position.
    pub(crate) fn from_arena(entities: Vec<EntityMetadata>) -> Self {
        let mut by_name = HashMap::with_capacity(entities.len());
        let mut by_table: HashMap<String, EntityId> = HashMap::with_capacity(entities.len());
        for meta in &entities {
            by_name.insert(meta.name.clone(), meta.id);
            // A shared single-table name resolves to the table's root entity.
            let is_child = meta.table.kind == TableKind::SingleTableChild;
            match by_table.get(&meta.table.name) {
                Some(_) if is_child => {}
                _ => {
                    by_table.insert(meta.table.name.clone(), meta.id);
                }
            }
        }
        Self {
            entities,
            by_name,
            by_table,
        }
    }

    /// Look up an entity by entity name, falling back to table name.
    pub fn find(&self, name_or_table: &str) -> Result<&EntityMetadata> {
        self.find_entity(name_or_table)
            .or_else(|| self.find_table(name_or_table))
            .ok_or_else(|| MetadataError::not_found(name_or_table).into())
    }

    pub fn find_entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.by_name.get(name).map(|id| &self.entities[id.0])
    }

    pub fn find_table(&self, table: &str) -> Option<&EntityMetadata> {
        self.by_table.get(table).map(|id| &self.entities[id.0])
    }

    /// Resolve an arena handle produced by this registry.
    ///
    /// Relation targets always resolve. For handles that may come from
    /// elsewhere, such as an alias map, use [`get`](Self::get).
    pub fn entity(&self, id: EntityId) -> &EntityMetadata {
        &self.entities[id.0]
    }

    /// Resolve an arena handle, `None` when it is out of range.
    pub fn get(&self, id: EntityId) -> Option<&EntityMetadata> {
        self.entities.get(id.0)
    }

    /// The target entity of a relation.
    pub fn relation_target(&self, relation: &RelationMetadata) -> &EntityMetadata {
        self.entity(relation.target)
    }

    /// The counterpart of a bidirectional relation, if declared.
    pub fn inverse_of(&self, relation: &RelationMetadata) -> Option<&RelationMetadata> {
        let inverse = relation.inverse.as_deref()?;
        self.relation_target(relation).relation(inverse)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityMetadata> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
