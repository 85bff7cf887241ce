//! Core types for relmap.
//!
//! This crate provides the foundations the query and session layers build on:
//!
//! - `Value` and `Row` for flat query results
//! - `Entity` and `Related` for hydrated, diffable entity graphs
//! - `PrimaryKey` and `EntityIdentity` for grouping and identity comparisons
//! - the `metadata` model: declarations, inheritance merge and the frozen
//!   `MetadataRegistry`
//! - `EngineConfig` and the shared `Error` type

pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod row;
pub mod types;
pub mod value;

pub use config::EngineConfig;
pub use entity::{Entity, Related};
pub use error::{
    AliasError, CascadeError, ConfigError, Error, ExecutionError, HydrationError, MetadataError,
    MetadataErrorKind, Result, SubscriberError,
};
pub use identity::{EntityIdentity, PrimaryKey, values_equal};
pub use metadata::{
    Cascade, CascadeOperation, ColumnDecl, ColumnMetadata, EntityId, EntityMetadata, IndexDecl,
    MetadataBuilder, MetadataRegistry, RelationDecl, RelationKind, RelationMetadata, TableDecl,
    TableKind,
};
pub use row::{ColumnInfo, Row};
pub use types::SqlType;
pub use value::Value;
