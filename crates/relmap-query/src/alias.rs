//! Alias maps: which entity each join alias selects, and how aliases nest.
//!
//! A joined query selects every entity under its own alias. The alias map
//! records the tree those aliases form: the root alias, and for every other
//! alias the parent alias plus the relation property it was joined through.
//! The hydrator walks this tree to rebuild nested entities.

use relmap_core::{AliasError, EntityId, EntityMetadata, MetadataRegistry, Result};
use std::collections::HashMap;

/// One alias bound to an entity within a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub entity: EntityId,
    pub entity_name: String,
    /// Parent alias; `None` only for the root
    pub parent: Option<String>,
    /// Relation property on the parent's entity this alias was joined through
    pub relation: Option<String>,
}

impl Alias {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// The alias tree of one query.
///
/// # Example
///
/// ```
/// use relmap_core::SqlType;
/// use relmap_core::metadata::{ColumnDecl, MetadataBuilder, RelationDecl, TableDecl};
/// use relmap_query::AliasMap;
///
/// let mut builder = MetadataBuilder::new();
/// builder.register(
///     TableDecl::new("Post"),
///     vec![ColumnDecl::primary("id")],
///     vec![RelationDecl::one_to_many("comments", "Comment", "post")],
/// )?;
/// builder.register(
///     TableDecl::new("Comment"),
///     vec![ColumnDecl::primary("id"), ColumnDecl::new("text", SqlType::Text)],
///     vec![RelationDecl::many_to_one("post", "Post")],
/// )?;
/// let registry = builder.build_all()?;
///
/// let aliases = AliasMap::from_includes(&registry, "post", "Post", &["comments"])?;
/// let child = aliases.find_by_parent("post", "comments").unwrap();
/// assert_eq!(child.name, "post_comments");
/// assert_eq!(child.entity_name, "Comment");
/// # Ok::<(), relmap_core::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    aliases: Vec<Alias>,
    by_name: HashMap<String, usize>,
    /// (parent alias, relation property) -> child alias
    by_parent: HashMap<(String, String), usize>,
    /// Per alias: relation property -> (target handle, target name)
    relations: Vec<HashMap<String, (EntityId, String)>>,
    root: Option<usize>,
}

impl AliasMap {
    /// Create an empty alias map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the root alias. A map has exactly one.
    pub fn add_root_alias(
        &mut self,
        alias: impl Into<String>,
        entity: &EntityMetadata,
    ) -> Result<&mut Self> {
        let alias = alias.into();
        if let Some(root) = self.root {
            return Err(AliasError {
                message: format!("root alias '{}' is already set", self.aliases[root].name),
                alias,
            }
            .into());
        }
        self.check_name(&alias)?;
        self.root = Some(self.push(
            Alias {
                name: alias,
                entity: entity.id,
                entity_name: entity.name.clone(),
                parent: None,
                relation: None,
            },
            entity,
        ));
        Ok(self)
    }

    /// Add an alias joined to `parent_alias` through `relation`.
    ///
    /// `relation` must be declared on the parent alias's entity and `entity`
    /// must be its target.
    pub fn add_alias(
        &mut self,
        alias: impl Into<String>,
        entity: &EntityMetadata,
        parent_alias: &str,
        relation: impl Into<String>,
    ) -> Result<&mut Self> {
        let alias = alias.into();
        let relation = relation.into();
        self.check_name(&alias)?;
        let Some(&parent_index) = self.by_name.get(parent_alias) else {
            return Err(AliasError {
                alias,
                message: format!("parent alias '{}' does not exist", parent_alias),
            }
            .into());
        };
        let Some((target, target_name)) = self.relations[parent_index].get(&relation) else {
            return Err(AliasError {
                message: format!(
                    "{} has no relation '{}'",
                    self.aliases[parent_index].entity_name, relation
                ),
                alias,
            }
            .into());
        };
        if *target != entity.id || *target_name != entity.name {
            return Err(AliasError {
                message: format!(
                    "relation '{}' targets {}, not {}",
                    relation, target_name, entity.name
                ),
                alias,
            }
            .into());
        }
        let key = (parent_alias.to_string(), relation);
        if let Some(existing) = self.by_parent.get(&key) {
            return Err(AliasError {
                message: format!(
                    "relation '{}' of '{}' is already selected as '{}'",
                    key.1, parent_alias, self.aliases[*existing].name
                ),
                alias,
            }
            .into());
        }
        let index = self.push(
            Alias {
                name: alias,
                entity: entity.id,
                entity_name: entity.name.clone(),
                parent: Some(key.0.clone()),
                relation: Some(key.1.clone()),
            },
            entity,
        );
        self.by_parent.insert(key, index);
        Ok(self)
    }

    /// Build an alias map from dotted include paths.
    ///
    /// Each path segment names a relation on the previous segment's target.
    /// Child aliases are named `<parent alias>_<relation>`; shared prefixes
    /// such as `comments` in `["comments", "comments.author"]` are joined once.
    #[tracing::instrument(level = "debug", skip(registry))]
    pub fn from_includes(
        registry: &MetadataRegistry,
        root_alias: &str,
        root: &str,
        includes: &[&str],
    ) -> Result<Self> {
        let root_meta = registry.find(root)?;
        let mut map = Self::new();
        map.add_root_alias(root_alias, root_meta)?;

        for path in includes {
            let mut parent_alias = root_alias.to_string();
            let mut parent_meta = root_meta;
            for segment in path.split('.').map(str::trim).filter(|s| !s.is_empty()) {
                let relation = parent_meta.relation(segment).ok_or_else(|| AliasError {
                    alias: parent_alias.clone(),
                    message: format!("{} has no relation '{}'", parent_meta.name, segment),
                })?;
                let target = registry.relation_target(relation);
                let existing = map
                    .find_by_parent(&parent_alias, segment)
                    .map(|a| a.name.clone());
                let child_alias = if let Some(name) = existing {
                    name
                } else {
                    let name = format!("{}_{}", parent_alias, segment);
                    map.add_alias(name.clone(), target, &parent_alias, segment)?;
                    name
                };
                parent_alias = child_alias;
                parent_meta = target;
            }
        }

        tracing::debug!(aliases = map.len(), "Alias map built from includes");
        Ok(map)
    }

    pub fn find_by_name(&self, alias: &str) -> Option<&Alias> {
        self.by_name.get(alias).map(|&i| &self.aliases[i])
    }

    /// The alias joined to `parent_alias` through `relation`, if selected.
    pub fn find_by_parent(&self, parent_alias: &str, relation: &str) -> Option<&Alias> {
        self.by_parent
            .get(&(parent_alias.to_string(), relation.to_string()))
            .map(|&i| &self.aliases[i])
    }

    pub fn root(&self) -> Option<&Alias> {
        self.root.map(|i| &self.aliases[i])
    }

    /// Direct children of an alias, in insertion order.
    pub fn children<'a>(&'a self, parent_alias: &'a str) -> impl Iterator<Item = &'a Alias> + 'a {
        self.aliases
            .iter()
            .filter(move |a| a.parent.as_deref() == Some(parent_alias))
    }

    /// All aliases, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Alias> {
        self.aliases.iter()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn check_name(&self, alias: &str) -> Result<()> {
        if alias.is_empty() {
            return Err(AliasError {
                alias: alias.to_string(),
                message: "alias name must not be empty".to_string(),
            }
            .into());
        }
        if self.by_name.contains_key(alias) {
            return Err(AliasError {
                alias: alias.to_string(),
                message: "alias is already defined".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn push(&mut self, alias: Alias, entity: &EntityMetadata) -> usize {
        let index = self.aliases.len();
        self.by_name.insert(alias.name.clone(), index);
        self.aliases.push(alias);
        self.relations.push(
            entity
                .relations
                .iter()
                .map(|r| (r.property.clone(), (r.target, r.target_name.clone())))
                .collect(),
        );
        index
    }
}
