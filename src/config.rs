//! Configuration for the query compiler
//!
//! Provides a builder pattern for configuring how portable queries are lowered.

use serde::{Deserialize, Serialize};

fn default_id_field() -> String {
    "_id".to_string()
}

fn default_point_lookup() -> bool {
    true
}

fn default_max_result_window() -> u64 {
    10_000
}

/// Configuration shared by every backend compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Element name that carries an entity's identity (default: "_id")
    #[serde(rename = "idField", default = "default_id_field")]
    pub id_field: String,
    /// Whether ID predicates may be diverted into key lookups on backends that support it
    #[serde(rename = "pointLookup", default = "default_point_lookup")]
    pub point_lookup: bool,
    /// Upper bound on rows requested from backends that cannot return unbounded results
    #[serde(rename = "maxResultWindow", default = "default_max_result_window")]
    pub max_result_window: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            point_lookup: default_point_lookup(),
            max_result_window: default_max_result_window(),
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration builder
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::new()
    }

    /// Returns true if `name` is the configured identity element
    pub fn is_id_field(&self, name: &str) -> bool {
        self.id_field == name
    }
}

/// Builder for CompilerConfig
#[derive(Debug)]
pub struct CompilerConfigBuilder {
    id_field: String,
    point_lookup: bool,
    max_result_window: u64,
}

impl Default for CompilerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerConfigBuilder {
    pub fn new() -> Self {
        let defaults = CompilerConfig::default();
        Self {
            id_field: defaults.id_field,
            point_lookup: defaults.point_lookup,
            max_result_window: defaults.max_result_window,
        }
    }

    /// Set the identity element name (default: "_id")
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    /// Enable or disable point-lookup diversion
    pub fn point_lookup(mut self, enabled: bool) -> Self {
        self.point_lookup = enabled;
        self
    }

    /// Disable point-lookup diversion; ID predicates stay in the filter
    pub fn without_point_lookup(self) -> Self {
        self.point_lookup(false)
    }

    /// Set the row cap used for unbounded queries on windowed backends
    pub fn max_result_window(mut self, rows: u64) -> Self {
        self.max_result_window = rows;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CompilerConfig {
        CompilerConfig {
            id_field: self.id_field,
            point_lookup: self.point_lookup,
            max_result_window: self.max_result_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::builder().build();

        assert_eq!(config.id_field, "_id");
        assert!(config.point_lookup);
        assert_eq!(config.max_result_window, 10_000);
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_custom_id_field() {
        let config = CompilerConfig::builder().id_field("uuid").build();

        assert_eq!(config.id_field, "uuid");
        assert!(config.is_id_field("uuid"));
        assert!(!config.is_id_field("_id"));
    }

    #[test]
    fn test_without_point_lookup() {
        let config = CompilerConfig::builder().without_point_lookup().build();
        assert!(!config.point_lookup);
    }

    #[test]
    fn test_full_custom_config() {
        let config = CompilerConfig::builder()
            .id_field("key")
            .point_lookup(false)
            .max_result_window(500)
            .build();

        assert_eq!(config.id_field, "key");
        assert!(!config.point_lookup);
        assert_eq!(config.max_result_window, 500);
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: CompilerConfig = serde_json::from_str(r#"{"idField": "id"}"#).unwrap();

        assert_eq!(config.id_field, "id");
        assert!(config.point_lookup);
        assert_eq!(config.max_result_window, 10_000);
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = serde_json::to_string(&CompilerConfig::default()).unwrap();
        assert!(json.contains("\"idField\""));
        assert!(json.contains("\"pointLookup\""));
        assert!(json.contains("\"maxResultWindow\""));
    }
}
