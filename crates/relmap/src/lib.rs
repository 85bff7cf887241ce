//! relmap - entity metadata, join-result hydration and cascade diff planning.
//!
//! relmap is the relational-mapping core of an ORM, without the SQL:
//!
//! - Declare entities, columns, relations and inheritance with builder values
//!   and freeze them into a `MetadataRegistry`
//! - Hydrate flat, duplicate-laden join rows into deduplicated nested entities
//! - Diff an edited entity graph against its last-loaded state and get back a
//!   permission-checked plan of inserts, updates and removes
//! - Notify lifecycle subscribers around every load and persisted operation
//!
//! # Quick Start
//!
//! ```
//! use relmap::prelude::*;
//!
//! let mut builder = MetadataBuilder::new();
//! builder
//!     .register(
//!         TableDecl::new("Post"),
//!         vec![ColumnDecl::primary("id"), ColumnDecl::new("title", SqlType::Text)],
//!         vec![RelationDecl::one_to_many("comments", "Comment", "post").cascade_insert()],
//!     )?
//!     .register(
//!         TableDecl::new("Comment"),
//!         vec![ColumnDecl::primary("id"), ColumnDecl::new("text", SqlType::Text)],
//!         vec![RelationDecl::many_to_one("post", "Post")],
//!     )?;
//! let manager = EntityManager::new(builder.build_all()?);
//!
//! let old = Entity::new("Post")
//!     .with("id", 1i64)
//!     .with("title", "A")
//!     .with_many("comments", vec![]);
//! let new = old
//!     .clone()
//!     .with_many("comments", vec![Entity::new("Comment").with("text", "hi")]);
//!
//! let plan = manager.plan(Some(&old), &new)?;
//! assert_eq!(plan.inserts.len(), 1);
//! assert!(plan.updates.is_empty());
//! assert!(plan.removes.is_empty());
//! # Ok::<(), relmap::Error>(())
//! ```

pub mod manager;

pub use manager::EntityManager;

pub use relmap_core::metadata::{
    DefaultNamingStrategy, IndexMetadata, JoinColumn, NamingStrategy, TableMetadata,
};
pub use relmap_core::{
    AliasError, Cascade, CascadeError, CascadeOperation, ColumnDecl, ColumnInfo, ColumnMetadata,
    ConfigError, EngineConfig, Entity, EntityId, EntityIdentity, EntityMetadata, Error,
    ExecutionError, HydrationError, IndexDecl, MetadataBuilder, MetadataError, MetadataErrorKind,
    MetadataRegistry, PrimaryKey, Related, RelationDecl, RelationKind, RelationMetadata, Result,
    Row, SqlType, SubscriberError, TableDecl, TableKind, Value,
};
pub use relmap_query::{Alias, AliasMap, Hydrator};
pub use relmap_session::{
    CascadePlanner, EntitySubscriber, EntityTarget, InsertOperation, LifecycleBroadcaster,
    LifecycleEvent, LifecyclePhase, OperationOrderer, PersistExecutor, PersistOperation,
    PersistPlan, PersistResult, RemoveOperation, UpdateOperation,
};

/// Everything needed to declare metadata, load and save.
pub mod prelude {
    pub use crate::{
        AliasMap,
        Cascade,
        CascadeOperation,
        ColumnDecl,
        EngineConfig,
        Entity,
        EntityManager,
        EntitySubscriber,
        EntityTarget,
        Error,
        LifecycleEvent,
        LifecyclePhase,
        MetadataBuilder,
        MetadataRegistry,
        PersistExecutor,
        PersistPlan,
        Related,
        RelationDecl,
        Result,
        Row,
        SqlType,
        TableDecl,
        Value,
    };
}
