//! Engine configuration.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by hydration and cascade planning.
///
/// Missing JSON fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Separator between alias and column name in result rows (`post_title`).
    pub column_separator: String,
    /// Treat a changed target of an owning to-one relation as an update.
    pub diff_relation_keys: bool,
    /// Leave create-date and update-date columns out of update diffs.
    pub skip_date_columns_in_diff: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            column_separator: "_".to_string(),
            diff_relation_keys: true,
            skip_date_columns_in_diff: true,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON.
    ///
    /// # Example
    ///
    /// ```
    /// use relmap_core::EngineConfig;
    ///
    /// let config = EngineConfig::from_json(r#"{"column_separator": "__"}"#)?;
    /// assert_eq!(config.column_separator, "__");
    /// assert!(config.diff_relation_keys);
    /// # Ok::<(), relmap_core::Error>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError {
            message: format!("invalid engine configuration: {}", e),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ConfigError {
                message: format!("failed to serialize engine configuration: {}", e),
                source: Some(Box::new(e)),
            }
            .into()
        })
    }

    fn validate(&self) -> Result<()> {
        if self.column_separator.is_empty() {
            return Err(ConfigError {
                message: "column_separator must not be empty".to_string(),
                source: None,
            }
            .into());
        }
        Ok(())
    }

    /// Set the alias/column separator (builder pattern).
    pub fn column_separator(mut self, separator: impl Into<String>) -> Self {
        self.column_separator = separator.into();
        self
    }

    /// Set whether owning to-one target changes count as updates (builder pattern).
    pub fn diff_relation_keys(mut self, value: bool) -> Self {
        self.diff_relation_keys = value;
        self
    }

    /// Set whether date columns are skipped in update diffs (builder pattern).
    pub fn skip_date_columns_in_diff(mut self, value: bool) -> Self {
        self.skip_date_columns_in_diff = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.column_separator, "_");
        assert!(config.diff_relation_keys);
        assert!(config.skip_date_columns_in_diff);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"skip_date_columns_in_diff": false}"#).unwrap();
        assert_eq!(config.column_separator, "_");
        assert!(!config.skip_date_columns_in_diff);
    }

    #[test]
    fn test_from_json_errors() {
        let err = EngineConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = EngineConfig::from_json(r#"{"column_separator": ""}"#).unwrap_err();
        assert!(err.to_string().contains("column_separator"));
    }

    #[test]
    fn test_builder_and_json_roundtrip() {
        let config = EngineConfig::new()
            .column_separator("__")
            .diff_relation_keys(false);
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
