//! The entity manager: one registry, one configuration, one set of
//! subscribers, shared by every load and save.

use relmap_core::{EngineConfig, Entity, MetadataRegistry, Result, Row};
use relmap_query::{AliasMap, Hydrator};
use relmap_session::{
    CascadePlanner, EntitySubscriber, EntityTarget, LifecycleBroadcaster, LifecycleEvent,
    LifecyclePhase, OperationOrderer, PersistExecutor, PersistPlan, PersistResult,
};
use std::sync::Arc;

/// Ties hydration, cascade planning and lifecycle events together.
///
/// # Example
///
/// ```
/// use relmap::prelude::*;
///
/// let mut builder = MetadataBuilder::new();
/// builder.register(
///     TableDecl::new("Post"),
///     vec![ColumnDecl::primary("id"), ColumnDecl::new("title", SqlType::Text)],
///     vec![],
/// )?;
/// let mut manager = EntityManager::new(builder.build_all()?);
///
/// let aliases = manager.aliases("p", "Post", &[])?;
/// let rows = vec![Row::from_pairs([("p_id", Value::BigInt(1)), ("p_title", "A".into())])];
/// let posts = manager.hydrate(&rows, &aliases)?;
/// assert_eq!(posts[0].get("title"), Some(&Value::Text("A".to_string())));
/// # Ok::<(), relmap::Error>(())
/// ```
#[derive(Debug)]
pub struct EntityManager {
    registry: Arc<MetadataRegistry>,
    config: EngineConfig,
    broadcaster: LifecycleBroadcaster,
    orderer: OperationOrderer,
}

impl EntityManager {
    pub fn new(registry: impl Into<Arc<MetadataRegistry>>) -> Self {
        let registry = registry.into();
        let orderer = OperationOrderer::from_registry(&registry);
        Self {
            registry,
            config: EngineConfig::default(),
            broadcaster: LifecycleBroadcaster::new(),
            orderer,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> &LifecycleBroadcaster {
        &self.broadcaster
    }

    /// Register a subscriber after all existing ones.
    pub fn subscribe(&mut self, subscriber: impl EntitySubscriber + 'static) {
        self.broadcaster.subscribe(subscriber);
    }

    /// Register a closure for one lifecycle phase.
    pub fn on(
        &mut self,
        phase: LifecyclePhase,
        target: EntityTarget,
        f: impl FnMut(&LifecycleEvent<'_>) -> Result<()> + Send + 'static,
    ) {
        self.broadcaster.on(phase, target, f);
    }

    /// Alias map for `root` and its dotted include paths.
    pub fn aliases(&self, root_alias: &str, root: &str, includes: &[&str]) -> Result<AliasMap> {
        AliasMap::from_includes(&self.registry, root_alias, root, includes)
    }

    /// Hydrate rows into root entities, firing after-load once per root.
    #[tracing::instrument(level = "debug", skip_all, fields(rows = rows.len()))]
    pub fn hydrate(&mut self, rows: &[Row], aliases: &AliasMap) -> Result<Vec<Entity>> {
        let roots = Hydrator::with_config(&self.registry, self.config.clone())
            .hydrate(rows, aliases)?;
        for root in &roots {
            self.broadcaster.notify(
                LifecyclePhase::AfterLoad,
                root.entity_name(),
                &LifecycleEvent::new(root),
            )?;
        }
        Ok(roots)
    }

    /// Plan the operations that persist `new`, ordered for execution.
    pub fn plan(&self, old: Option<&Entity>, new: &Entity) -> Result<PersistPlan> {
        let plan = CascadePlanner::new(&self.registry)
            .with_config(self.config.clone())
            .plan(old, new)?;
        Ok(self.orderer.order_plan(plan))
    }

    /// Plan and execute in one step.
    ///
    /// Nothing runs when planning fails.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %new.entity_name()))]
    pub fn save<E: PersistExecutor + ?Sized>(
        &mut self,
        old: Option<&Entity>,
        new: &Entity,
        executor: &mut E,
    ) -> Result<PersistResult> {
        let plan = self.plan(old, new)?;
        if plan.is_empty() {
            tracing::debug!("Nothing to persist");
            return Ok(PersistResult::new());
        }
        plan.execute(executor, &mut self.broadcaster)
    }
}
