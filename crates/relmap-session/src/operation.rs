//! Persist operations, their ordering and execution.
//!
//! A [`PersistPlan`] groups the operations a diff produced:
//! - INSERT targets first (owning relations need their target's key)
//! - UPDATE in traversal order
//! - REMOVE owners first (nothing may still point at a removed row)
//!
//! Statement generation is not done here. A caller-supplied
//! [`PersistExecutor`] performs each operation against its store.

use crate::events::{LifecycleBroadcaster, LifecycleEvent, LifecyclePhase};
use relmap_core::{Entity, EntityIdentity, MetadataRegistry, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Insert a new entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertOperation {
    pub entity: Entity,
}

/// Update an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOperation {
    /// The new state.
    pub entity: Entity,
    /// The last-known persisted state.
    pub snapshot: Entity,
    /// Column properties whose values differ, in declaration order.
    pub changed_columns: Vec<String>,
    /// Owning to-one relations whose target changed.
    pub changed_relations: Vec<String>,
}

/// Remove an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveOperation {
    pub identity: EntityIdentity,
    pub snapshot: Entity,
}

/// A single persistence operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PersistOperation {
    Insert(InsertOperation),
    Update(UpdateOperation),
    Remove(RemoveOperation),
}

impl PersistOperation {
    /// Entity type the operation applies to.
    pub fn entity_name(&self) -> &str {
        match self {
            PersistOperation::Insert(op) => op.entity.entity_name(),
            PersistOperation::Update(op) => op.entity.entity_name(),
            PersistOperation::Remove(op) => &op.identity.entity,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, PersistOperation::Insert(_))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, PersistOperation::Update(_))
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, PersistOperation::Remove(_))
    }
}

/// Performs persist operations against a store.
pub trait PersistExecutor {
    fn insert(&mut self, op: &InsertOperation) -> Result<()>;

    fn update(&mut self, op: &UpdateOperation) -> Result<()>;

    fn remove(&mut self, op: &RemoveOperation) -> Result<()>;
}

/// Orders operations by the foreign-key dependencies of their entities.
///
/// An entity depends on the targets of its owning to-one relations. Its
/// depth is the length of the longest dependency chain below it. Entities
/// that reach each other through foreign keys form one group and share a
/// depth, so mutual references keep traversal order.
///
/// Ordering works per entity type. Self-references carry no dependency, so
/// a new `Category` whose parent is also a new `Category` keeps traversal
/// order (the child, being the root of the save, comes first). Such a
/// graph needs the parent saved on its own beforehand, or a nullable
/// parent key set by a later update.
#[derive(Debug, Default)]
pub struct OperationOrderer {
    /// Entities in registration order.
    entities: Vec<String>,
    /// Entity -> entities it holds a foreign key to.
    dependencies: HashMap<String, Vec<String>>,
    depths: HashMap<String, usize>,
}

impl OperationOrderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive dependencies from every entity in the registry.
    pub fn from_registry(registry: &MetadataRegistry) -> Self {
        let mut orderer = Self::new();
        for entity in registry.entities() {
            let mut targets: Vec<String> = Vec::new();
            for relation in entity.relations.iter().filter(|r| r.is_owning_to_one()) {
                if relation.target_name != entity.name && !targets.contains(&relation.target_name)
                {
                    targets.push(relation.target_name.clone());
                }
            }
            orderer.entities.push(entity.name.clone());
            orderer.dependencies.insert(entity.name.clone(), targets);
        }
        orderer.compute_depths();
        orderer
    }

    /// Register an entity's dependencies directly.
    pub fn register_entity(&mut self, entity: impl Into<String>, depends_on: Vec<String>) {
        let entity = entity.into();
        if !self.entities.contains(&entity) {
            self.entities.push(entity.clone());
        }
        self.dependencies.insert(entity, depends_on);
        self.compute_depths();
    }

    /// Length of the longest dependency chain below `entity`.
    pub fn dependency_depth(&self, entity: &str) -> usize {
        self.depths.get(entity).copied().unwrap_or(0)
    }

    /// Group and sort operations into a plan.
    ///
    /// Sorting is stable: operations of equal depth keep their input order.
    pub fn order(&self, ops: impl IntoIterator<Item = PersistOperation>) -> PersistPlan {
        let mut plan = PersistPlan::new();
        for op in ops {
            match op {
                PersistOperation::Insert(op) => plan.inserts.push(op),
                PersistOperation::Update(op) => plan.updates.push(op),
                PersistOperation::Remove(op) => plan.removes.push(op),
            }
        }

        plan.inserts
            .sort_by_key(|op| self.dependency_depth(op.entity.entity_name()));
        plan.removes.sort_by(|a, b| {
            let a_depth = self.dependency_depth(&a.identity.entity);
            let b_depth = self.dependency_depth(&b.identity.entity);
            b_depth.cmp(&a_depth)
        });

        tracing::trace!(
            inserts = plan.inserts.len(),
            updates = plan.updates.len(),
            removes = plan.removes.len(),
            "Persist plan ordered"
        );
        plan
    }

    /// Reorder an existing plan.
    pub fn order_plan(&self, plan: PersistPlan) -> PersistPlan {
        self.order(plan.into_operations())
    }

    fn compute_depths(&mut self) {
        // Registered entities first, then targets nobody registered.
        let mut nodes: Vec<&str> = self.entities.iter().map(String::as_str).collect();
        for entity in &self.entities {
            for target in self.dependencies.get(entity).into_iter().flatten() {
                if !nodes.contains(&target.as_str()) {
                    nodes.push(target);
                }
            }
        }
        let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let edges: Vec<Vec<usize>> = nodes
            .iter()
            .map(|node| {
                self.dependencies
                    .get(*node)
                    .into_iter()
                    .flatten()
                    .filter_map(|t| index.get(t.as_str()).copied())
                    .collect()
            })
            .collect();
        let reach: Vec<HashSet<usize>> = (0..nodes.len()).map(|n| reachable(&edges, n)).collect();

        let mut memo = vec![None; nodes.len()];
        let mut depths = HashMap::with_capacity(nodes.len());
        for (n, node) in nodes.iter().enumerate() {
            let depth = group_depth(n, &edges, &reach, &mut memo);
            depths.insert((*node).to_string(), depth);
        }
        self.depths = depths;
    }
}

/// Nodes reachable from `start` through at least one edge.
fn reachable(edges: &[Vec<usize>], start: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack: Vec<usize> = edges[start].clone();
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            stack.extend(&edges[node]);
        }
    }
    seen
}

/// Longest chain below the group of nodes mutually reachable with `node`.
///
/// Edges leaving the group point into groups that cannot reach back, so the
/// recursion follows an acyclic graph.
fn group_depth(
    node: usize,
    edges: &[Vec<usize>],
    reach: &[HashSet<usize>],
    memo: &mut [Option<usize>],
) -> usize {
    if let Some(depth) = memo[node] {
        return depth;
    }
    let group: Vec<usize> = (0..edges.len())
        .filter(|&m| m == node || (reach[node].contains(&m) && reach[m].contains(&node)))
        .collect();
    let mut depth = 0;
    for &member in &group {
        for &target in &edges[member] {
            if !group.contains(&target) {
                depth = depth.max(group_depth(target, edges, reach, memo) + 1);
            }
        }
    }
    for &member in &group {
        memo[member] = Some(depth);
    }
    depth
}

/// The operations one save produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistPlan {
    pub inserts: Vec<InsertOperation>,
    pub updates: Vec<UpdateOperation>,
    pub removes: Vec<RemoveOperation>,
}

impl PersistPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.removes.len()
    }

    /// All operations in execution order.
    pub fn into_operations(self) -> Vec<PersistOperation> {
        let mut ops = Vec::with_capacity(self.len());
        ops.extend(self.inserts.into_iter().map(PersistOperation::Insert));
        ops.extend(self.updates.into_iter().map(PersistOperation::Update));
        ops.extend(self.removes.into_iter().map(PersistOperation::Remove));
        ops
    }

    /// Run the plan: inserts, then updates, then removes.
    ///
    /// Before/after events fire around every operation. The first failure,
    /// from a subscriber or the executor, stops execution; operations that
    /// already ran are not undone.
    #[tracing::instrument(level = "debug", skip_all, fields(operations = self.len()))]
    pub fn execute<E: PersistExecutor + ?Sized>(
        &self,
        executor: &mut E,
        broadcaster: &mut LifecycleBroadcaster,
    ) -> Result<PersistResult> {
        let mut result = PersistResult::new();

        for op in &self.inserts {
            let entity_type = op.entity.entity_name();
            let event = LifecycleEvent::new(&op.entity);
            broadcaster.notify(LifecyclePhase::BeforeInsert, entity_type, &event)?;
            executor.insert(op)?;
            broadcaster.notify(LifecyclePhase::AfterInsert, entity_type, &event)?;
            result.inserted += 1;
        }

        for op in &self.updates {
            let entity_type = op.entity.entity_name();
            let event = LifecycleEvent::new(&op.entity)
                .with_snapshot(&op.snapshot)
                .with_changes(&op.changed_columns);
            broadcaster.notify(LifecyclePhase::BeforeUpdate, entity_type, &event)?;
            executor.update(op)?;
            broadcaster.notify(LifecyclePhase::AfterUpdate, entity_type, &event)?;
            result.updated += 1;
        }

        for op in &self.removes {
            let entity_type = op.identity.entity.as_str();
            let event = LifecycleEvent::new(&op.snapshot);
            broadcaster.notify(LifecyclePhase::BeforeRemove, entity_type, &event)?;
            executor.remove(op)?;
            broadcaster.notify(LifecyclePhase::AfterRemove, entity_type, &event)?;
            result.removed += 1;
        }

        tracing::debug!(
            inserted = result.inserted,
            updated = result.updated,
            removed = result.removed,
            "Persist plan executed"
        );
        Ok(result)
    }
}

/// Counts of executed operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistResult {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

impl PersistResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EntityTarget;
    use relmap_core::{Error, ExecutionError, PrimaryKey};
    use std::sync::{Arc, Mutex};

    fn insert(entity: &str, id: i64) -> PersistOperation {
        PersistOperation::Insert(InsertOperation {
            entity: Entity::new(entity).with("id", id),
        })
    }

    fn remove(entity: &str, id: i64) -> PersistOperation {
        PersistOperation::Remove(RemoveOperation {
            identity: EntityIdentity::new(entity, PrimaryKey::single(id)),
            snapshot: Entity::new(entity).with("id", id),
        })
    }

    fn update(entity: &str, id: i64) -> PersistOperation {
        PersistOperation::Update(UpdateOperation {
            entity: Entity::new(entity).with("id", id).with("title", "new"),
            snapshot: Entity::new(entity).with("id", id).with("title", "old"),
            changed_columns: vec!["title".to_string()],
            changed_relations: Vec::new(),
        })
    }

    fn chain_orderer() -> OperationOrderer {
        // Reply -> Comment -> Post
        let mut orderer = OperationOrderer::new();
        orderer.register_entity("Post", vec![]);
        orderer.register_entity("Comment", vec!["Post".to_string()]);
        orderer.register_entity("Reply", vec!["Comment".to_string()]);
        orderer
    }

    #[derive(Default)]
    struct Recording {
        calls: Vec<String>,
        fail_on: Option<String>,
    }

    impl PersistExecutor for Recording {
        fn insert(&mut self, op: &InsertOperation) -> Result<()> {
            self.record(format!("insert {}", op.entity.entity_name()))
        }

        fn update(&mut self, op: &UpdateOperation) -> Result<()> {
            self.record(format!("update {}", op.entity.entity_name()))
        }

        fn remove(&mut self, op: &RemoveOperation) -> Result<()> {
            self.record(format!("remove {}", op.identity))
        }
    }

    impl Recording {
        fn record(&mut self, call: String) -> Result<()> {
            if self.fail_on.as_deref() == Some(call.as_str()) {
                return Err(ExecutionError {
                    message: format!("{call} failed"),
                    source: None,
                }
                .into());
            }
            self.calls.push(call);
            Ok(())
        }
    }

    #[test]
    fn test_depth_is_transitive() {
        let orderer = chain_orderer();
        assert_eq!(orderer.dependency_depth("Post"), 0);
        assert_eq!(orderer.dependency_depth("Comment"), 1);
        assert_eq!(orderer.dependency_depth("Reply"), 2);
        assert_eq!(orderer.dependency_depth("Unknown"), 0);
    }

    #[test]
    fn test_mutual_references_share_a_depth() {
        for _ in 0..20 {
            let mut orderer = OperationOrderer::new();
            orderer.register_entity("A", vec!["B".to_string()]);
            orderer.register_entity("B", vec!["A".to_string()]);
            orderer.register_entity("C", vec!["A".to_string()]);
            assert_eq!(orderer.dependency_depth("A"), 0);
            assert_eq!(orderer.dependency_depth("B"), 0);
            assert_eq!(orderer.dependency_depth("C"), 1);

            let plan = orderer.order(vec![insert("C", 1), insert("B", 1), insert("A", 1)]);
            let names: Vec<&str> =
                plan.inserts.iter().map(|op| op.entity.entity_name()).collect();
            assert_eq!(names, vec!["B", "A", "C"]);
        }
    }

    #[test]
    fn test_unregistered_targets_count_as_leaves() {
        let mut orderer = OperationOrderer::new();
        orderer.register_entity("Comment", vec!["Post".to_string()]);
        assert_eq!(orderer.dependency_depth("Comment"), 1);
        assert_eq!(orderer.dependency_depth("Post"), 0);
    }

    #[test]
    fn test_inserts_targets_first() {
        let orderer = chain_orderer();
        let plan = orderer.order(vec![
            insert("Reply", 1),
            insert("Comment", 1),
            insert("Post", 1),
            insert("Post", 2),
        ]);
        let names: Vec<&str> = plan.inserts.iter().map(|op| op.entity.entity_name()).collect();
        assert_eq!(names, vec!["Post", "Post", "Comment", "Reply"]);
    }

    #[test]
    fn test_removes_owners_first() {
        let orderer = chain_orderer();
        let plan = orderer.order(vec![remove("Post", 1), remove("Reply", 3), remove("Comment", 2)]);
        let names: Vec<&str> = plan.removes.iter().map(|op| op.identity.entity.as_str()).collect();
        assert_eq!(names, vec!["Reply", "Comment", "Post"]);
    }

    #[test]
    fn test_plan_counts_and_operations() {
        let plan = chain_orderer().order(vec![
            update("Post", 1),
            remove("Comment", 2),
            insert("Comment", 3),
        ]);
        assert_eq!(plan.len(), 3);
        assert!(!plan.is_empty());
        assert!(PersistPlan::new().is_empty());

        let ops = plan.into_operations();
        assert!(ops[0].is_insert());
        assert!(ops[1].is_update());
        assert!(ops[2].is_remove());
        assert_eq!(ops[2].entity_name(), "Comment");
    }

    #[test]
    fn test_execute_runs_phases_in_order() {
        let plan = chain_orderer().order(vec![
            remove("Comment", 2),
            update("Post", 1),
            insert("Comment", 3),
        ]);

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut broadcaster = LifecycleBroadcaster::new();
        for phase in LifecyclePhase::ALL {
            let sink = Arc::clone(&events);
            broadcaster.on(phase, EntityTarget::Any, move |event| {
                sink.lock()
                    .unwrap()
                    .push(format!("{} {}", phase, event.entity.entity_name()));
                Ok(())
            });
        }

        let mut executor = Recording::default();
        let result = plan.execute(&mut executor, &mut broadcaster).unwrap();
        assert_eq!(result.total(), 3);
        assert_eq!(
            executor.calls,
            vec!["insert Comment", "update Post", "remove Comment(2)"]
        );
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "before-insert Comment",
                "after-insert Comment",
                "before-update Post",
                "after-update Post",
                "before-remove Comment",
                "after-remove Comment",
            ]
        );
    }

    #[test]
    fn test_execute_stops_at_first_failure() {
        let plan = chain_orderer().order(vec![insert("Post", 1), update("Post", 1)]);
        let mut broadcaster = LifecycleBroadcaster::new();
        let mut executor = Recording {
            fail_on: Some("insert Post".to_string()),
            ..Recording::default()
        };
        let err = plan.execute(&mut executor, &mut broadcaster).unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        assert!(executor.calls.is_empty());
    }

    #[test]
    fn test_plan_serializes_tagged_operations() {
        let plan = chain_orderer().order(vec![insert("Post", 1)]);
        let json = serde_json::to_value(plan.into_operations()).unwrap();
        assert_eq!(json[0]["op"], "insert");
    }
}
