//! Client configuration.

use crate::error::DbResult;
use serde::Deserialize;

/// Fallback used when an embedded resource has no explicit entry in
/// [`Relations`](crate::Relations).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationInference {
    /// Unregistered pairs are a [`DbError::Relation`](crate::DbError::Relation).
    Disabled,
    /// Guess FK columns from table names (`customers` -> `customer_id`).
    #[default]
    NamingConvention,
}

/// Settings shared by every builder created from a [`Client`](crate::Client).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary key column assumed for every table.
    pub primary_key: String,
    /// Fill a missing primary key with a UUID v4 string on insert/upsert.
    pub generate_ids: bool,
    pub relation_inference: RelationInference,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            primary_key: "id".to_string(),
            generate_ids: true,
            relation_inference: RelationInference::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn generate_ids(mut self, enabled: bool) -> Self {
        self.generate_ids = enabled;
        self
    }

    pub fn relation_inference(mut self, policy: RelationInference) -> Self {
        self.relation_inference = policy;
        self
    }

    /// Parse from TOML; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> DbResult<Self> {
        Ok(toml::from_str(raw)?)
    }
}
