//! Runtime entity values.
//!
//! An [`Entity`] is one instance of a registered entity type: its column
//! values keyed by property name plus one slot per relation. Hydration
//! produces them and the cascade planner diffs them.

use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// The loaded state of one relation slot.
///
/// A slot that was never requested is [`Related::Unloaded`] (or missing from
/// the entity altogether). It is distinct from a loaded to-one without a
/// target, which is `One(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Related {
    /// Not loaded; says nothing about the stored relation.
    #[default]
    Unloaded,
    /// A loaded to-one relation.
    One(Option<Box<Entity>>),
    /// A loaded to-many relation.
    Many(Vec<Entity>),
}

impl Related {
    /// A loaded to-one slot holding `entity`.
    pub fn one(entity: Entity) -> Self {
        Related::One(Some(Box::new(entity)))
    }

    /// A loaded to-one slot without a target.
    pub const fn none() -> Self {
        Related::One(None)
    }

    pub fn many(entities: Vec<Entity>) -> Self {
        Related::Many(entities)
    }

    pub const fn is_loaded(&self) -> bool {
        !matches!(self, Related::Unloaded)
    }

    /// The to-one target, if loaded and present.
    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Related::One(Some(e)) => Some(e),
            _ => None,
        }
    }

    /// The to-many targets, if loaded.
    pub fn as_many(&self) -> Option<&[Entity]> {
        match self {
            Related::Many(list) => Some(list),
            _ => None,
        }
    }

    /// Every loaded target, in slot order.
    pub fn entities(&self) -> Vec<&Entity> {
        match self {
            Related::Unloaded | Related::One(None) => Vec::new(),
            Related::One(Some(e)) => vec![e.as_ref()],
            Related::Many(list) => list.iter().collect(),
        }
    }

    /// Whether the slot is loaded and holds at least one target.
    pub fn has_targets(&self) -> bool {
        match self {
            Related::Unloaded | Related::One(None) => false,
            Related::One(Some(_)) => true,
            Related::Many(list) => !list.is_empty(),
        }
    }
}

/// One instance of an entity type.
///
/// # Example
///
/// ```
/// use relmap_core::{Entity, Related, Value};
///
/// let post = Entity::new("Post")
///     .with("id", 1i64)
///     .with("title", "A")
///     .with_many("comments", vec![Entity::new("Comment").with("text", "hi")]);
///
/// assert_eq!(post.get("title"), Some(&Value::Text("A".to_string())));
/// assert_eq!(post.related("comments").len(), 1);
/// assert!(!post.is_loaded("author"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    entity: String,
    values: BTreeMap<String, Value>,
    relations: BTreeMap<String, Related>,
}

impl Entity {
    /// Create an empty instance of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Entity type name.
    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    /// Set a column value, builder style.
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    /// Load a to-one relation with a target.
    pub fn with_one(mut self, property: impl Into<String>, target: Entity) -> Self {
        self.set_relation(property, Related::one(target));
        self
    }

    /// Load a to-one relation without a target.
    pub fn with_none(mut self, property: impl Into<String>) -> Self {
        self.set_relation(property, Related::none());
        self
    }

    /// Load a to-many relation.
    pub fn with_many(mut self, property: impl Into<String>, targets: Vec<Entity>) -> Self {
        self.set_relation(property, Related::many(targets));
        self
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(property.into(), value.into());
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.values.remove(property)
    }

    /// Column values, ordered by property name.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn set_relation(&mut self, property: impl Into<String>, related: Related) {
        self.relations.insert(property.into(), related);
    }

    /// The relation slot, if one was set.
    pub fn relation(&self, property: &str) -> Option<&Related> {
        self.relations.get(property)
    }

    pub fn relation_mut(&mut self, property: &str) -> Option<&mut Related> {
        self.relations.get_mut(property)
    }

    /// Relation slots, ordered by property name.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Related)> {
        self.relations.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Whether the relation slot is set and loaded.
    pub fn is_loaded(&self, property: &str) -> bool {
        self.relations.get(property).is_some_and(Related::is_loaded)
    }

    /// Loaded targets of a relation; empty when unloaded.
    pub fn related(&self, property: &str) -> Vec<&Entity> {
        self.relations
            .get(property)
            .map(Related::entities)
            .unwrap_or_default()
    }

    /// Whether any relation slot holds a target.
    pub fn has_related(&self) -> bool {
        self.relations.values().any(Related::has_targets)
    }

    /// Render as plain JSON: columns as untagged values, loaded relations
    /// nested, unloaded relations omitted.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (property, value) in &self.values {
            map.insert(property.clone(), value.to_json());
        }
        for (property, related) in &self.relations {
            let rendered = match related {
                Related::Unloaded => continue,
                Related::One(None) => serde_json::Value::Null,
                Related::One(Some(e)) => e.to_json(),
                Related::Many(list) => {
                    serde_json::Value::Array(list.iter().map(Entity::to_json).collect())
                }
            };
            map.insert(property.clone(), rendered);
        }
        serde_json::Value::Object(map)
    }
}
