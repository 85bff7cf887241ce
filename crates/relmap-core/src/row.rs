//! Flat result rows as produced by the query execution layer.
//!
//! A joined query yields one `Row` per result tuple. Columns from different
//! aliases share a single namespace, so every column name is prefixed with the
//! alias that selected it (`<alias><separator><column>`, e.g. `post_title`).

use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// This struct is wrapped in `Arc` so all rows from the same query share
/// the same column information, saving memory for large result sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Rows provide both index-based and name-based access to column values.
/// Column metadata is shared via `Arc` for memory efficiency.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values in order
    values: Vec<Value>,
    /// Shared column metadata
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Create a row from `(column, value)` pairs.
    ///
    /// # Example
    ///
    /// ```
    /// use relmap_core::{Row, Value};
    ///
    /// let row = Row::from_pairs([("post_id", Value::BigInt(1)), ("post_title", "A".into())]);
    /// assert_eq!(row.get_by_name("post_id"), Some(&Value::BigInt(1)));
    /// ```
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(names, values)
    }

    /// Get the shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index. O(1) operation.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name. O(1) operation via HashMap lookup.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get the value an alias selected for `column`.
    ///
    /// Returns `None` when the column was not selected at all, which callers
    /// must keep distinct from a selected `Value::Null`.
    pub fn get_aliased(&self, alias: &str, separator: &str, column: &str) -> Option<&Value> {
        let mut key = String::with_capacity(alias.len() + separator.len() + column.len());
        key.push_str(alias);
        key.push_str(separator);
        key.push_str(column);
        self.get_by_name(&key)
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_basic_access() {
        let row = Row::new(
            vec!["post_id".to_string(), "post_title".to_string()],
            vec![Value::BigInt(1), Value::Text("A".to_string())],
        );

        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
        assert_eq!(row.get_by_name("post_title"), Some(&Value::Text("A".to_string())));
        assert_eq!(row.get_by_name("missing"), None);
    }

    #[test]
    fn test_get_aliased_distinguishes_missing_from_null() {
        let row = Row::from_pairs([("c_id", Value::Null)]);
        assert_eq!(row.get_aliased("c", "_", "id"), Some(&Value::Null));
        assert_eq!(row.get_aliased("c", "_", "text"), None);
        assert_eq!(row.get_aliased("c", "__", "id"), None);
    }

    #[test]
    fn test_row_shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["a".to_string(), "b".to_string()]));
        let r1 = Row::with_columns(Arc::clone(&columns), vec![Value::Int(1), Value::Int(2)]);
        let r2 = Row::with_columns(Arc::clone(&columns), vec![Value::Int(3), Value::Int(4)]);

        assert!(Arc::ptr_eq(&r1.column_info(), &r2.column_info()));
        assert_eq!(r2.get_by_name("b"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_row_iterators() {
        let row = Row::from_pairs([("x", Value::Int(1)), ("y", Value::Null)]);
        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["x", "y"]);
        let pairs: Vec<(&str, &Value)> = row.iter().collect();
        assert_eq!(pairs[1], ("y", &Value::Null));
        assert_eq!(row.values().count(), 2);
        assert!(row.contains_column("x"));
    }
}
