//! Cascade diff planning.
//!
//! [`CascadePlanner::plan`] compares an entity graph with the state it was
//! last loaded in and derives the inserts, updates and removes needed to
//! persist it. Every relation carries its own cascade permissions:
//!
//! - a new related entity needs cascade-insert, or planning fails
//! - a changed related entity needs cascade-update, or planning fails
//! - a related entity that disappeared is removed only with cascade-remove,
//!   and is otherwise left alone
//!
//! Planning has no side effects. A permission failure aborts the whole plan
//! before anything runs.

use crate::operation::{InsertOperation, PersistPlan, RemoveOperation, UpdateOperation};
use relmap_core::{
    CascadeError, CascadeOperation, EngineConfig, Entity, EntityIdentity, EntityMetadata, Error,
    MetadataRegistry, Related, RelationMetadata, Result, Value, values_equal,
};
use std::collections::{HashMap, HashSet};

/// Identity of a to-one slot's target, for relation key diffing.
#[derive(Debug, PartialEq, Eq)]
enum TargetKey {
    Empty,
    /// A target without a key yet; always counts as a change.
    Unsaved,
    Saved(EntityIdentity),
}

/// Derives persist plans from entity graph diffs.
#[derive(Debug, Clone)]
pub struct CascadePlanner<'a> {
    registry: &'a MetadataRegistry,
    config: EngineConfig,
}

impl<'a> CascadePlanner<'a> {
    pub fn new(registry: &'a MetadataRegistry) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plan the operations that persist `new`.
    ///
    /// `old` is the graph as last loaded, or `None` for a brand-new root, in
    /// which case the root is the first insert. A root without a key is
    /// always new.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %new.entity_name()))]
    pub fn plan(&self, old: Option<&Entity>, new: &Entity) -> Result<PersistPlan> {
        let metadata = self.registry.find(new.entity_name())?;
        let old_identities = old
            .map(|graph| self.extract_identities(graph, metadata))
            .unwrap_or_default();

        let mut plan = PersistPlan::new();
        let existing = match old {
            Some(old) if self.identity_of(metadata, new).is_some() => Some(old),
            _ => None,
        };
        if existing.is_none() {
            plan.inserts.push(InsertOperation {
                entity: new.clone(),
            });
        }
        plan.inserts
            .extend(self.plan_inserts(new, metadata, &old_identities)?);

        if let Some(old) = existing {
            plan.updates = self.plan_updates(old, new, metadata)?;
            let new_identities = self.extract_identities(new, metadata);
            plan.removes = self.plan_removes(old, new, metadata, &new_identities);
        }

        tracing::debug!(
            inserts = plan.inserts.len(),
            updates = plan.updates.len(),
            removes = plan.removes.len(),
            "Persist plan derived"
        );
        Ok(plan)
    }

    /// Identities of the root and of every keyed entity reachable from it
    /// through loaded relations.
    pub fn extract_identities(
        &self,
        graph: &Entity,
        metadata: &EntityMetadata,
    ) -> HashSet<EntityIdentity> {
        let mut identities = HashSet::new();
        if let Some(identity) = self.identity_of(metadata, graph) {
            identities.insert(identity);
        }
        self.walk_graph(graph, metadata, &mut |identity, _| {
            identities.insert(identity);
        });
        identities
    }

    /// Inserts for related entities that are unsaved or unknown to the old
    /// graph. The root itself is not considered.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %metadata.name))]
    pub fn plan_inserts(
        &self,
        new: &Entity,
        metadata: &EntityMetadata,
        old_identities: &HashSet<EntityIdentity>,
    ) -> Result<Vec<InsertOperation>> {
        let mut inserts = Vec::new();
        let mut visited: HashSet<EntityIdentity> =
            self.identity_of(metadata, new).into_iter().collect();
        self.walk_inserts(new, metadata, old_identities, &mut visited, &mut inserts)?;
        Ok(inserts)
    }

    /// Removes for related entities of the old graph that are absent from
    /// the new one.
    ///
    /// Relations without cascade-remove are skipped silently. A relation
    /// that is not loaded on the matching new entity is not diffed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %metadata.name))]
    pub fn plan_removes(
        &self,
        old: &Entity,
        new: &Entity,
        metadata: &EntityMetadata,
        new_identities: &HashSet<EntityIdentity>,
    ) -> Vec<RemoveOperation> {
        let mut index: HashMap<EntityIdentity, &Entity> = HashMap::new();
        self.walk_graph(new, metadata, &mut |identity, entity| {
            index.entry(identity).or_insert(entity);
        });

        let mut removes = Vec::new();
        let mut visited: HashSet<EntityIdentity> =
            self.identity_of(metadata, old).into_iter().collect();
        let mut walk = RemoveWalk {
            new_identities,
            index: &index,
            visited: &mut visited,
            removes: &mut removes,
        };
        self.walk_removes(old, Some(new), metadata, &mut walk);
        removes
    }

    /// Updates for the root and for every related entity, paired by
    /// identity, whose persisted state changed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %metadata.name))]
    pub fn plan_updates(
        &self,
        old: &Entity,
        new: &Entity,
        metadata: &EntityMetadata,
    ) -> Result<Vec<UpdateOperation>> {
        let mut updates = Vec::new();
        let mut visited: HashSet<EntityIdentity> =
            self.identity_of(metadata, new).into_iter().collect();
        if let Some(op) = self.diff(old, new, metadata) {
            updates.push(op);
        }
        self.walk_updates(old, new, metadata, &mut visited, &mut updates)?;
        Ok(updates)
    }

    // ========================================================================
    // Traversals
    // ========================================================================

    /// Visit every keyed entity reachable through loaded relations.
    ///
    /// Entity graphs are owned trees, so the walk needs no cycle guard.
    fn walk_graph<'e>(
        &self,
        entity: &'e Entity,
        metadata: &EntityMetadata,
        visit: &mut dyn FnMut(EntityIdentity, &'e Entity),
    ) {
        for relation in &metadata.relations {
            let Some(slot) = entity.relation(&relation.property) else {
                continue;
            };
            for target in slot.entities() {
                let target_meta = self.target_metadata(relation, target);
                if let Some(identity) = self.identity_of(target_meta, target) {
                    visit(identity, target);
                }
                self.walk_graph(target, target_meta, visit);
            }
        }
    }

    fn walk_inserts(
        &self,
        entity: &Entity,
        metadata: &EntityMetadata,
        old_identities: &HashSet<EntityIdentity>,
        visited: &mut HashSet<EntityIdentity>,
        inserts: &mut Vec<InsertOperation>,
    ) -> Result<()> {
        for relation in &metadata.relations {
            let Some(slot) = entity.relation(&relation.property) else {
                continue;
            };
            for target in slot.entities() {
                let target_meta = self.target_metadata(relation, target);
                let identity = self.identity_of(target_meta, target);
                if let Some(identity) = &identity {
                    if !visited.insert(identity.clone()) {
                        continue;
                    }
                }
                let is_new = identity
                    .as_ref()
                    .is_none_or(|identity| !old_identities.contains(identity));
                if is_new {
                    if !relation.allows(CascadeOperation::Insert) {
                        return Err(not_allowed(metadata, relation, CascadeOperation::Insert));
                    }
                    tracing::trace!(
                        entity = target_meta.name.as_str(),
                        relation = relation.property.as_str(),
                        "Cascade insert"
                    );
                    inserts.push(InsertOperation {
                        entity: target.clone(),
                    });
                }
                self.walk_inserts(target, target_meta, old_identities, visited, inserts)?;
            }
        }
        Ok(())
    }

    fn walk_updates(
        &self,
        old: &Entity,
        new: &Entity,
        metadata: &EntityMetadata,
        visited: &mut HashSet<EntityIdentity>,
        updates: &mut Vec<UpdateOperation>,
    ) -> Result<()> {
        for relation in &metadata.relations {
            let (Some(old_slot), Some(new_slot)) = (
                old.relation(&relation.property),
                new.relation(&relation.property),
            ) else {
                continue;
            };
            if !old_slot.is_loaded() || !new_slot.is_loaded() {
                continue;
            }

            let mut previous_by_identity: HashMap<EntityIdentity, &Entity> = HashMap::new();
            for previous in old_slot.entities() {
                let previous_meta = self.target_metadata(relation, previous);
                if let Some(identity) = self.identity_of(previous_meta, previous) {
                    previous_by_identity.entry(identity).or_insert(previous);
                }
            }

            for target in new_slot.entities() {
                let target_meta = self.target_metadata(relation, target);
                let Some(identity) = self.identity_of(target_meta, target) else {
                    continue;
                };
                let Some(previous) = previous_by_identity.get(&identity).copied() else {
                    continue;
                };
                if !visited.insert(identity) {
                    continue;
                }
                if let Some(op) = self.diff(previous, target, target_meta) {
                    if !relation.allows(CascadeOperation::Update) {
                        return Err(not_allowed(metadata, relation, CascadeOperation::Update));
                    }
                    tracing::trace!(
                        entity = target_meta.name.as_str(),
                        relation = relation.property.as_str(),
                        changed = ?op.changed_columns,
                        "Cascade update"
                    );
                    updates.push(op);
                }
                self.walk_updates(previous, target, target_meta, visited, updates)?;
            }
        }
        Ok(())
    }

    /// `current` is the matching entity of the new graph; `None` when `old`
    /// itself is being removed.
    fn walk_removes(
        &self,
        old: &Entity,
        current: Option<&Entity>,
        metadata: &EntityMetadata,
        walk: &mut RemoveWalk<'_, '_>,
    ) {
        for relation in &metadata.relations {
            let Some(slot) = old.relation(&relation.property) else {
                continue;
            };
            if current.is_some_and(|entity| !entity.is_loaded(&relation.property)) {
                tracing::trace!(
                    entity = metadata.name.as_str(),
                    relation = relation.property.as_str(),
                    "Relation not loaded on new graph, not diffed for removal"
                );
                continue;
            }
            for target in slot.entities() {
                let target_meta = self.target_metadata(relation, target);
                let Some(identity) = self.identity_of(target_meta, target) else {
                    continue;
                };
                if !walk.visited.insert(identity.clone()) {
                    continue;
                }
                if walk.new_identities.contains(&identity) {
                    let index = walk.index;
                    let counterpart = index.get(&identity).copied();
                    self.walk_removes(target, counterpart, target_meta, walk);
                } else if relation.allows(CascadeOperation::Remove) {
                    tracing::trace!(
                        identity = %identity,
                        relation = relation.property.as_str(),
                        "Cascade remove"
                    );
                    walk.removes.push(RemoveOperation {
                        identity,
                        snapshot: target.clone(),
                    });
                    self.walk_removes(target, None, target_meta, walk);
                } else {
                    tracing::trace!(
                        identity = %identity,
                        relation = relation.property.as_str(),
                        "Removal skipped without cascade-remove"
                    );
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Compare two states of one entity.
    fn diff(
        &self,
        old: &Entity,
        new: &Entity,
        metadata: &EntityMetadata,
    ) -> Option<UpdateOperation> {
        let skip_dates = self.config.skip_date_columns_in_diff;
        let changed_columns: Vec<String> = metadata
            .persisted_columns()
            .filter(|column| !(skip_dates && column.is_store_maintained()))
            .filter(|column| {
                new.get(&column.property).is_some_and(|value| {
                    !values_equal(old.get(&column.property).unwrap_or(&Value::Null), value)
                })
            })
            .map(|column| column.property.clone())
            .collect();

        let changed_relations: Vec<String> = if self.config.diff_relation_keys {
            metadata
                .relations
                .iter()
                .filter(|relation| relation.is_owning_to_one())
                .filter(|relation| {
                    let before = old.relation(&relation.property).filter(|s| s.is_loaded());
                    let after = new.relation(&relation.property).filter(|s| s.is_loaded());
                    match (before, after) {
                        (Some(before), Some(after)) => {
                            let after = self.target_key(relation, after);
                            after == TargetKey::Unsaved
                                || self.target_key(relation, before) != after
                        }
                        _ => false,
                    }
                })
                .map(|relation| relation.property.clone())
                .collect()
        } else {
            Vec::new()
        };

        if changed_columns.is_empty() && changed_relations.is_empty() {
            return None;
        }
        Some(UpdateOperation {
            entity: new.clone(),
            snapshot: old.clone(),
            changed_columns,
            changed_relations,
        })
    }

    fn target_key(&self, relation: &RelationMetadata, slot: &Related) -> TargetKey {
        match slot.as_one() {
            None => TargetKey::Empty,
            Some(target) => {
                let target_meta = self.target_metadata(relation, target);
                self.identity_of(target_meta, target)
                    .map_or(TargetKey::Unsaved, TargetKey::Saved)
            }
        }
    }

    /// `None` when the entity has no key yet.
    fn identity_of(&self, metadata: &EntityMetadata, entity: &Entity) -> Option<EntityIdentity> {
        let key = metadata.primary_key_of(entity);
        if key.is_null() {
            None
        } else {
            Some(EntityIdentity::new(metadata.name.clone(), key))
        }
    }

    /// Metadata for a related entity: its own type when registered, else the
    /// relation's target.
    fn target_metadata(&self, relation: &RelationMetadata, entity: &Entity) -> &'a EntityMetadata {
        self.registry
            .find_entity(entity.entity_name())
            .unwrap_or_else(|| self.registry.relation_target(relation))
    }
}

/// State shared by the removal traversal.
struct RemoveWalk<'w, 'e> {
    new_identities: &'w HashSet<EntityIdentity>,
    index: &'w HashMap<EntityIdentity, &'e Entity>,
    visited: &'w mut HashSet<EntityIdentity>,
    removes: &'w mut Vec<RemoveOperation>,
}

fn not_allowed(
    metadata: &EntityMetadata,
    relation: &RelationMetadata,
    operation: CascadeOperation,
) -> Error {
    tracing::debug!(
        entity = metadata.name.as_str(),
        relation = relation.property.as_str(),
        operation = operation.as_str(),
        "Cascade not allowed"
    );
    CascadeError {
        entity: metadata.name.clone(),
        relation: relation.property.clone(),
        operation,
    }
    .into()
}
