//! The metadata model: entities, columns, relations and tables.
//!
//! Declarations (`TableDecl`, `ColumnDecl`, `RelationDecl`, `IndexDecl`) are
//! registered with a [`MetadataBuilder`], which merges inherited declarations
//! into concrete entities, resolves relation targets into [`EntityId`]
//! handles and freezes everything into a [`MetadataRegistry`].

mod builder;
mod column;
mod entity;
pub mod naming;
mod registry;
mod relation;
mod table;

pub use builder::MetadataBuilder;
pub use column::{ColumnDecl, ColumnMetadata};
pub use entity::{EntityId, EntityMetadata};
pub use naming::{DefaultNamingStrategy, NamingStrategy};
pub use registry::MetadataRegistry;
pub use relation::{
    Cascade, CascadeOperation, JoinColumn, RelationDecl, RelationKind, RelationMetadata,
};
pub use table::{IndexDecl, IndexMetadata, TableDecl, TableKind, TableMetadata};
