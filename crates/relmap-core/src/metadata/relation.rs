//! Relation declarations, cascade permissions and resolved relation metadata.

use super::EntityId;
use serde::Serialize;
use std::fmt;

/// The cardinality of a relation, seen from the declaring entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    /// One-to-one: `User` has one `Profile`.
    OneToOne,
    /// One-to-many: one `Post` has many `Comment`s.
    OneToMany,
    /// Many-to-one: many `Comment`s belong to one `Post`.
    #[default]
    ManyToOne,
    /// Many-to-many: `Post`s have many `Tag`s via a join table.
    ManyToMany,
}

impl RelationKind {
    /// Whether the relation holds a list of targets.
    pub const fn is_collection(self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }

    /// The kind a bidirectional counterpart must have.
    pub const fn inverse_kind(self) -> RelationKind {
        match self {
            RelationKind::OneToOne => RelationKind::OneToOne,
            RelationKind::OneToMany => RelationKind::ManyToOne,
            RelationKind::ManyToOne => RelationKind::OneToMany,
            RelationKind::ManyToMany => RelationKind::ManyToMany,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RelationKind::OneToOne => "one-to-one",
            RelationKind::OneToMany => "one-to-many",
            RelationKind::ManyToOne => "many-to-one",
            RelationKind::ManyToMany => "many-to-many",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation that may be cascaded through a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CascadeOperation {
    Insert,
    Update,
    Remove,
}

impl CascadeOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            CascadeOperation::Insert => "insert",
            CascadeOperation::Update => "update",
            CascadeOperation::Remove => "remove",
        }
    }
}

impl fmt::Display for CascadeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of operations a relation cascades. Each is granted independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cascade {
    pub insert: bool,
    pub update: bool,
    pub remove: bool,
}

impl Cascade {
    /// No cascading at all.
    pub const NONE: Cascade = Cascade {
        insert: false,
        update: false,
        remove: false,
    };

    /// Cascade every operation.
    pub const ALL: Cascade = Cascade {
        insert: true,
        update: true,
        remove: true,
    };

    /// Whether `op` is granted.
    pub const fn allows(&self, op: CascadeOperation) -> bool {
        match op {
            CascadeOperation::Insert => self.insert,
            CascadeOperation::Update => self.update,
            CascadeOperation::Remove => self.remove,
        }
    }

    /// Grant one more operation.
    pub const fn with(mut self, op: CascadeOperation) -> Self {
        match op {
            CascadeOperation::Insert => self.insert = true,
            CascadeOperation::Update => self.update = true,
            CascadeOperation::Remove => self.remove = true,
        }
        self
    }

    /// Parse a cascade list such as `"insert, update"` or `"all"`.
    ///
    /// Unknown entries yield `None`.
    pub fn parse(opts: &str) -> Option<Self> {
        let mut cascade = Cascade::NONE;
        for part in opts.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            cascade = match part.to_ascii_lowercase().as_str() {
                "all" | "true" => Cascade::ALL,
                "insert" => cascade.with(CascadeOperation::Insert),
                "update" => cascade.with(CascadeOperation::Update),
                "remove" | "delete" => cascade.with(CascadeOperation::Remove),
                _ => return None,
            };
        }
        Some(cascade)
    }
}

/// A foreign-key column of an owning to-one relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinColumn {
    /// Column name on the declaring entity's table
    pub name: String,
    /// Primary-key property of the target entity the column references
    pub referenced_property: String,
}

impl JoinColumn {
    pub fn new(name: impl Into<String>, referenced_property: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            referenced_property: referenced_property.into(),
        }
    }
}

/// A relation as declared on an entity.
///
/// Targets are named, not referenced, so entities may point at each other
/// before either is registered. Names are resolved when the registry is built.
///
/// # Example
///
/// ```
/// use relmap_core::metadata::{Cascade, RelationDecl};
///
/// let comments = RelationDecl::one_to_many("comments", "Comment", "post")
///     .cascade(Cascade::ALL);
/// let author = RelationDecl::many_to_one("author", "User").nullable(false);
/// assert!(comments.cascade.insert);
/// assert!(!author.nullable);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDecl {
    pub property: String,
    pub kind: RelationKind,
    /// Target entity name
    pub target: String,
    /// Explicit owning flag; derived from the kind when absent
    pub owning: Option<bool>,
    /// Property name of the counterpart relation on the target
    pub inverse: Option<String>,
    pub cascade: Cascade,
    pub nullable: bool,
    /// Explicit join columns; derived from the target's primary key when empty
    pub join_columns: Vec<JoinColumn>,
    /// Explicit join table for an owning many-to-many side
    pub join_table: Option<String>,
}

impl RelationDecl {
    /// Create a relation with the given kind and no inverse side.
    pub fn new(property: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            kind,
            target: target.into(),
            owning: None,
            inverse: None,
            cascade: Cascade::NONE,
            nullable: true,
            join_columns: Vec::new(),
            join_table: None,
        }
    }

    pub fn many_to_one(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(property, RelationKind::ManyToOne, target)
    }

    /// One-to-many relations always name the owning many-to-one on the target.
    pub fn one_to_many(
        property: impl Into<String>,
        target: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        Self::new(property, RelationKind::OneToMany, target).inverse(inverse)
    }

    pub fn one_to_one(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(property, RelationKind::OneToOne, target)
    }

    pub fn many_to_many(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(property, RelationKind::ManyToMany, target)
    }

    /// Mark this side as storing (or not storing) the foreign key or join table.
    pub fn owning(mut self, value: bool) -> Self {
        self.owning = Some(value);
        self
    }

    pub fn inverse(mut self, property: impl Into<String>) -> Self {
        self.inverse = Some(property.into());
        self
    }

    pub fn cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn cascade_insert(mut self) -> Self {
        self.cascade = self.cascade.with(CascadeOperation::Insert);
        self
    }

    pub fn cascade_update(mut self) -> Self {
        self.cascade = self.cascade.with(CascadeOperation::Update);
        self
    }

    pub fn cascade_remove(mut self) -> Self {
        self.cascade = self.cascade.with(CascadeOperation::Remove);
        self
    }

    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Add an explicit join column. Implies the owning side.
    pub fn join_column(
        mut self,
        name: impl Into<String>,
        referenced_property: impl Into<String>,
    ) -> Self {
        self.join_columns.push(JoinColumn::new(name, referenced_property));
        self
    }

    /// Set the join table name. Implies the owning side.
    pub fn join_table(mut self, name: impl Into<String>) -> Self {
        self.join_table = Some(name.into());
        self
    }

    /// Resolve the owning flag.
    ///
    /// Many-to-one is always owning and one-to-many never is. A one-to-one or
    /// many-to-many side owns the relation when it says so explicitly, when it
    /// declares join columns or a join table, or when it has no inverse side.
    pub fn resolved_owning(&self) -> bool {
        match self.kind {
            RelationKind::ManyToOne => true,
            RelationKind::OneToMany => false,
            RelationKind::OneToOne | RelationKind::ManyToMany => {
                let declares_keys = !self.join_columns.is_empty() || self.join_table.is_some();
                self.owning
                    .unwrap_or(self.inverse.is_none() || declares_keys)
            }
        }
    }
}

/// A resolved relation of a built entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationMetadata {
    /// Entity the relation was resolved for
    pub entity: String,
    pub property: String,
    pub kind: RelationKind,
    /// Arena handle of the target entity in the registry
    pub target: EntityId,
    pub target_name: String,
    pub is_owning: bool,
    pub inverse: Option<String>,
    pub cascade: Cascade,
    pub is_nullable: bool,
    /// Foreign-key columns; non-empty only for owning to-one relations
    pub join_columns: Vec<JoinColumn>,
    /// Join table; present only on the owning side of a many-to-many
    pub join_table: Option<String>,
}

impl RelationMetadata {
    /// Many-to-one or owning one-to-one: the declaring row stores the key.
    pub fn is_owning_to_one(&self) -> bool {
        self.is_owning && matches!(self.kind, RelationKind::ManyToOne | RelationKind::OneToOne)
    }

    /// Whether the relation holds a single target (any one-to-one or many-to-one).
    pub fn is_to_one(&self) -> bool {
        !self.kind.is_collection()
    }

    pub fn allows(&self, op: CascadeOperation) -> bool {
        self.cascade.allows(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_flags_are_independent() {
        let c = Cascade::NONE.with(CascadeOperation::Remove);
        assert!(c.allows(CascadeOperation::Remove));
        assert!(!c.allows(CascadeOperation::Insert));
        assert!(!c.allows(CascadeOperation::Update));
    }

    #[test]
    fn test_cascade_parse() {
        assert_eq!(Cascade::parse("all"), Some(Cascade::ALL));
        assert_eq!(
            Cascade::parse("insert, update"),
            Some(Cascade {
                insert: true,
                update: true,
                remove: false
            })
        );
        assert_eq!(Cascade::parse(""), Some(Cascade::NONE));
        assert_eq!(Cascade::parse("insert, explode"), None);
    }

    #[test]
    fn test_owning_resolution() {
        assert!(RelationDecl::many_to_one("post", "Post").resolved_owning());
        assert!(!RelationDecl::one_to_many("comments", "Comment", "post").resolved_owning());

        // Unidirectional one-to-one owns its key.
        assert!(RelationDecl::one_to_one("profile", "Profile").resolved_owning());

        // Bidirectional sides need an explicit marker.
        let inverse_side = RelationDecl::one_to_one("user", "User").inverse("profile");
        assert!(!inverse_side.resolved_owning());
        let owning_side = RelationDecl::one_to_one("profile", "Profile")
            .inverse("user")
            .join_column("profile_id", "id");
        assert!(owning_side.resolved_owning());

        let tags = RelationDecl::many_to_many("tags", "Tag")
            .inverse("posts")
            .join_table("post_tags");
        assert!(tags.resolved_owning());
        let posts = RelationDecl::many_to_many("posts", "Post")
            .inverse("tags")
            .owning(false);
        assert!(!posts.resolved_owning());
    }

    #[test]
    fn test_kind_helpers() {
        assert!(RelationKind::OneToMany.is_collection());
        assert!(!RelationKind::OneToOne.is_collection());
        assert_eq!(RelationKind::OneToMany.inverse_kind(), RelationKind::ManyToOne);
        assert_eq!(RelationKind::ManyToMany.to_string(), "many-to-many");
        assert_eq!(CascadeOperation::Update.to_string(), "update");
    }
}
