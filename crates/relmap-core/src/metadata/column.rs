//! Column declarations and resolved column metadata.

use crate::types::SqlType;
use serde::Serialize;

/// A column as declared on an entity, before inheritance merge and naming.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDecl {
    /// Property name on the entity
    pub property: String,
    /// Explicit column name; derived from the property when absent
    pub column_name: Option<String>,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
    /// Computed projection only, never persisted or diffed
    pub is_virtual: bool,
    pub create_date: bool,
    pub update_date: bool,
    /// Value assigned by the store on insert (auto-increment, sequences)
    pub generated: bool,
    /// Default value expression
    pub default: Option<String>,
}

impl ColumnDecl {
    /// Declare a non-nullable column.
    pub fn new(property: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            property: property.into(),
            column_name: None,
            sql_type,
            primary_key: false,
            unique: false,
            nullable: false,
            is_virtual: false,
            create_date: false,
            update_date: false,
            generated: false,
            default: None,
        }
    }

    /// Declare a generated `BIGINT` primary key.
    pub fn primary(property: impl Into<String>) -> Self {
        Self::new(property, SqlType::BigInt)
            .primary_key(true)
            .auto_increment(true)
    }

    /// Set an explicit column name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Mark the column as a computed projection.
    pub fn virtual_column(mut self, value: bool) -> Self {
        self.is_virtual = value;
        self
    }

    /// Mark the column as maintained by the store on insert.
    pub fn create_date(mut self, value: bool) -> Self {
        self.create_date = value;
        self
    }

    /// Mark the column as maintained by the store on every update.
    pub fn update_date(mut self, value: bool) -> Self {
        self.update_date = value;
        self
    }

    pub fn auto_increment(mut self, value: bool) -> Self {
        self.generated = value;
        self
    }

    /// Set the default value expression.
    pub fn default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

/// A resolved column of a built entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMetadata {
    /// Entity the column was resolved for (not the ancestor that declared it)
    pub entity: String,
    pub property: String,
    pub column_name: String,
    pub sql_type: SqlType,
    pub is_primary: bool,
    pub is_unique: bool,
    pub is_nullable: bool,
    pub is_virtual: bool,
    pub is_create_date: bool,
    pub is_update_date: bool,
    pub is_generated: bool,
    pub default: Option<String>,
}

impl ColumnMetadata {
    pub(crate) fn from_decl(entity: &str, decl: &ColumnDecl, column_name: String) -> Self {
        Self {
            entity: entity.to_string(),
            property: decl.property.clone(),
            column_name,
            sql_type: decl.sql_type.clone(),
            is_primary: decl.primary_key,
            is_unique: decl.unique,
            is_nullable: decl.nullable,
            is_virtual: decl.is_virtual,
            is_create_date: decl.create_date,
            is_update_date: decl.update_date,
            is_generated: decl.generated,
            default: decl.default.clone(),
        }
    }

    /// Whether the column is written by inserts and updates.
    pub fn is_persisted(&self) -> bool {
        !self.is_virtual
    }

    /// Whether the store maintains this column itself.
    pub fn is_store_maintained(&self) -> bool {
        self.is_create_date || self.is_update_date
    }
}
