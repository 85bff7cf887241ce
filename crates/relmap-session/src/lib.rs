//! Persistence planning for relmap.
//!
//! - [`CascadePlanner`] diffs an entity graph against its last-loaded state
//!   and derives a [`PersistPlan`], enforcing per-relation cascade
//!   permissions.
//! - [`OperationOrderer`] sorts a plan by foreign-key dependencies.
//! - [`PersistPlan::execute`] runs a plan through a caller-supplied
//!   [`PersistExecutor`], notifying a [`LifecycleBroadcaster`] around every
//!   operation.
//!
//! Nothing here talks to a database.

pub mod events;
pub mod operation;
pub mod planner;

pub use events::{
    EntitySubscriber, EntityTarget, LifecycleBroadcaster, LifecycleEvent, LifecyclePhase,
};
pub use operation::{
    InsertOperation, OperationOrderer, PersistExecutor, PersistOperation, PersistPlan,
    PersistResult, RemoveOperation, UpdateOperation,
};
pub use planner::CascadePlanner;
