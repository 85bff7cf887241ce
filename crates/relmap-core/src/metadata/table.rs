//! Table and index declarations.

use serde::Serialize;

/// How a declared type maps onto storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum TableKind {
    /// A concrete entity with its own table.
    #[default]
    Regular,
    /// Declarations shared by descendants; no table of its own.
    Abstract,
    /// A group of columns embedded into descendants; no table of its own.
    Embeddable,
    /// A concrete closure table for tree entities.
    Closure,
    /// A concrete subtype stored in its parent's table.
    SingleTableChild,
}

impl TableKind {
    /// Whether entities of this kind are instantiated and stored.
    pub const fn is_concrete(self) -> bool {
        !matches!(self, TableKind::Abstract | TableKind::Embeddable)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TableKind::Regular => "regular",
            TableKind::Abstract => "abstract",
            TableKind::Embeddable => "embeddable",
            TableKind::Closure => "closure",
            TableKind::SingleTableChild => "single-table-child",
        }
    }
}

/// A table as declared for an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDecl {
    /// Entity name; the key every other declaration refers to
    pub entity: String,
    /// Explicit table name; derived from the entity name when absent
    pub name: Option<String>,
    pub kind: TableKind,
    /// Parent type whose declarations this type inherits
    pub extends: Option<String>,
}

impl TableDecl {
    /// Declare a regular entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            name: None,
            kind: TableKind::Regular,
            extends: None,
        }
    }

    /// Declare an abstract base type.
    pub fn abstract_base(entity: impl Into<String>) -> Self {
        Self::new(entity).kind(TableKind::Abstract)
    }

    /// Declare an embeddable column group.
    pub fn embeddable(entity: impl Into<String>) -> Self {
        Self::new(entity).kind(TableKind::Embeddable)
    }

    /// Declare a subtype stored in `parent`'s table.
    pub fn single_table_child(entity: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::new(entity)
            .kind(TableKind::SingleTableChild)
            .extends(parent)
    }

    /// Set an explicit table name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

/// Resolved table information of a built entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub entity: String,
    /// Physical table name (the parent's for single-table children)
    pub name: String,
    pub kind: TableKind,
    /// Ancestor chain, nearest first
    pub ancestors: Vec<String>,
}

/// An index as declared on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDecl {
    pub name: String,
    /// Column property names, in index order
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDecl {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }
}

/// A resolved index of a built entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMetadata {
    pub entity: String,
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
}
