//! Primary-key tuples and entity identities.
//!
//! Hydration groups rows by primary key and the cascade planner compares
//! entity graphs by `(entity, primary key)`. Both need a hashable key type,
//! which `Value` itself is not (it carries floats and JSON). `PrimaryKey`
//! provides that: a tuple of values with structural hashing, so a composite
//! key `(1, "2")` never collides with `(12, "")`.
//!
//! Integer widths are normalized, so a key read as `Int(1)` from one column
//! and `BigInt(1)` from a foreign-key column compare equal.

use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ordered tuple of primary-key values.
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryKey(Vec<Value>);

impl PrimaryKey {
    /// Create a key from its values, in primary-column declaration order.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Create a single-column key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// The key values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of key parts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every part is NULL (an unmatched outer join or a new entity).
    pub fn is_null(&self) -> bool {
        self.0.iter().all(Value::is_null)
    }

    /// True when any part is NULL.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| values_equal(a, b))
    }
}

impl Eq for PrimaryKey {}

impl Hash for PrimaryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for v in &self.0 {
            hash_key_part(v, state);
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match v {
                Value::Null => f.write_str("NULL")?,
                Value::Text(s) => write!(f, "{:?}", s)?,
                other => match other.as_i64() {
                    Some(n) => write!(f, "{}", n)?,
                    None => write!(f, "{:?}", other)?,
                },
            }
        }
        f.write_str(")")
    }
}

impl From<Value> for PrimaryKey {
    fn from(value: Value) -> Self {
        Self::single(value)
    }
}

/// Value equality used for keys and change detection.
///
/// Integer widths are normalized, consistent with key hashing.
///
/// Floats compare by bit pattern so that the relation stays reflexive.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        _ => a == b,
    }
}

/// Hash a single key part into the hasher.
fn hash_key_part(v: &Value, hasher: &mut impl Hasher) {
    if let Some(i) = v.as_i64() {
        1u8.hash(hasher);
        i.hash(hasher);
        return;
    }
    match v {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            2u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Float(f) => {
            3u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Double(f) => {
            4u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Decimal(s) => {
            5u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Text(s) => {
            6u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Bytes(b) => {
            7u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Date(d) => {
            8u8.hash(hasher);
            d.hash(hasher);
        }
        Value::Time(t) => {
            9u8.hash(hasher);
            t.hash(hasher);
        }
        Value::Timestamp(ts) => {
            10u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::TimestampTz(ts) => {
            11u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::Uuid(u) => {
            12u8.hash(hasher);
            u.hash(hasher);
        }
        Value::Json(j) => {
            13u8.hash(hasher);
            j.to_string().hash(hasher);
        }
        Value::Array(arr) => {
            14u8.hash(hasher);
            arr.len().hash(hasher);
            for item in arr {
                hash_key_part(item, hasher);
            }
        }
        // Integer variants are handled above.
        Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {}
    }
}

/// Identity of an entity instance: its entity name plus primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityIdentity {
    pub entity: String,
    pub key: PrimaryKey,
}

impl EntityIdentity {
    pub fn new(entity: impl Into<String>, key: PrimaryKey) -> Self {
        Self {
            entity: entity.into(),
            key,
        }
    }
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.entity, self.key)
    }
}
