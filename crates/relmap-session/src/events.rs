//! Entity lifecycle events and their subscribers.
//!
//! A [`LifecycleBroadcaster`] holds subscribers in registration order and
//! dispatches each event to those listening to the event's entity type. The
//! first subscriber to fail stops the dispatch and its error is returned.

use relmap_core::{Entity, Result};
use std::fmt;

/// Points in an entity's lifecycle at which subscribers are notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeRemove,
    AfterRemove,
    /// Fired once per root entity after hydration.
    AfterLoad,
}

impl LifecyclePhase {
    pub const ALL: [LifecyclePhase; 7] = [
        LifecyclePhase::BeforeInsert,
        LifecyclePhase::AfterInsert,
        LifecyclePhase::BeforeUpdate,
        LifecyclePhase::AfterUpdate,
        LifecyclePhase::BeforeRemove,
        LifecyclePhase::AfterRemove,
        LifecyclePhase::AfterLoad,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            LifecyclePhase::BeforeInsert => "before-insert",
            LifecyclePhase::AfterInsert => "after-insert",
            LifecyclePhase::BeforeUpdate => "before-update",
            LifecyclePhase::AfterUpdate => "after-update",
            LifecyclePhase::BeforeRemove => "before-remove",
            LifecyclePhase::AfterRemove => "after-remove",
            LifecyclePhase::AfterLoad => "after-load",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity types a subscriber listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTarget {
    /// Every entity type.
    Any,
    /// Exactly one entity type, by name.
    Named(String),
}

impl EntityTarget {
    pub fn named(entity: impl Into<String>) -> Self {
        EntityTarget::Named(entity.into())
    }

    pub fn matches(&self, entity_type: &str) -> bool {
        match self {
            EntityTarget::Any => true,
            EntityTarget::Named(name) => name == entity_type,
        }
    }
}

/// Payload of a lifecycle notification.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEvent<'a> {
    /// The entity being persisted, removed or loaded.
    ///
    /// For removals this is the last-known snapshot.
    pub entity: &'a Entity,
    /// Last-known persisted state, for updates
    pub snapshot: Option<&'a Entity>,
    /// Changed column properties, for updates
    pub changed_columns: &'a [String],
}

impl<'a> LifecycleEvent<'a> {
    pub fn new(entity: &'a Entity) -> Self {
        Self {
            entity,
            snapshot: None,
            changed_columns: &[],
        }
    }

    pub fn with_snapshot(mut self, snapshot: &'a Entity) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_changes(mut self, changed_columns: &'a [String]) -> Self {
        self.changed_columns = changed_columns;
        self
    }
}

/// Receives lifecycle events.
///
/// Every hook defaults to doing nothing. Returning `Err` aborts the
/// operation in progress and stops the dispatch to later subscribers.
///
/// # Example
///
/// ```
/// use relmap_core::Result;
/// use relmap_session::{EntitySubscriber, EntityTarget, LifecycleEvent};
///
/// struct PostAudit {
///     inserted: usize,
/// }
///
/// impl EntitySubscriber for PostAudit {
///     fn listen_to(&self) -> Option<EntityTarget> {
///         Some(EntityTarget::named("Post"))
///     }
///
///     fn after_insert(&mut self, _event: &LifecycleEvent<'_>) -> Result<()> {
///         self.inserted += 1;
///         Ok(())
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait EntitySubscriber: Send {
    /// Entity types this subscriber receives; `None` means every type.
    fn listen_to(&self) -> Option<EntityTarget> {
        None
    }

    fn before_insert(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn after_insert(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn before_update(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn after_update(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn before_remove(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn after_remove(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn after_load(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        Ok(())
    }

    /// Route an event to the hook for `phase`.
    fn on_event(&mut self, phase: LifecyclePhase, event: &LifecycleEvent<'_>) -> Result<()> {
        match phase {
            LifecyclePhase::BeforeInsert => self.before_insert(event),
            LifecyclePhase::AfterInsert => self.after_insert(event),
            LifecyclePhase::BeforeUpdate => self.before_update(event),
            LifecyclePhase::AfterUpdate => self.after_update(event),
            LifecyclePhase::BeforeRemove => self.before_remove(event),
            LifecyclePhase::AfterRemove => self.after_remove(event),
            LifecyclePhase::AfterLoad => self.after_load(event),
        }
    }
}

/// Type alias for closure subscribers.
type LifecycleFn = Box<dyn FnMut(&LifecycleEvent<'_>) -> Result<()> + Send>;

/// A closure bound to one phase and one target.
struct FnSubscriber {
    phase: LifecyclePhase,
    target: EntityTarget,
    callback: LifecycleFn,
}

impl EntitySubscriber for FnSubscriber {
    fn listen_to(&self) -> Option<EntityTarget> {
        Some(self.target.clone())
    }

    fn on_event(&mut self, phase: LifecyclePhase, event: &LifecycleEvent<'_>) -> Result<()> {
        if phase == self.phase {
            (self.callback)(event)
        } else {
            Ok(())
        }
    }
}

/// Dispatches lifecycle events to subscribers in registration order.
#[derive(Default)]
pub struct LifecycleBroadcaster {
    subscribers: Vec<Box<dyn EntitySubscriber>>,
}

impl fmt::Debug for LifecycleBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBroadcaster")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl LifecycleBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber after all existing ones.
    pub fn subscribe(&mut self, subscriber: impl EntitySubscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Register a closure for one phase of the targeted entity types.
    pub fn on(
        &mut self,
        phase: LifecyclePhase,
        target: EntityTarget,
        f: impl FnMut(&LifecycleEvent<'_>) -> Result<()> + Send + 'static,
    ) {
        self.subscribers.push(Box::new(FnSubscriber {
            phase,
            target,
            callback: Box::new(f),
        }));
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Notify every subscriber listening to `entity_type`.
    ///
    /// Stops at the first failing subscriber and returns its error.
    #[tracing::instrument(level = "trace", skip(self, event))]
    pub fn notify(
        &mut self,
        phase: LifecyclePhase,
        entity_type: &str,
        event: &LifecycleEvent<'_>,
    ) -> Result<()> {
        for (position, subscriber) in self.subscribers.iter_mut().enumerate() {
            let listens = subscriber
                .listen_to()
                .is_none_or(|target| target.matches(entity_type));
            if !listens {
                continue;
            }
            if let Err(e) = subscriber.on_event(phase, event) {
                tracing::debug!(
                    phase = phase.as_str(),
                    entity = entity_type,
                    subscriber = position,
                    error = %e,
                    "Subscriber rejected lifecycle event"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
