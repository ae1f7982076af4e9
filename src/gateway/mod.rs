//! Persistence gateway: the network seam of the auto-save machinery.
//!
//! The scheduler and the conflict resolver only see [`PersistenceGateway`].
//! [`HttpGateway`] is the production implementation against the CRM REST
//! API; tests substitute in-memory doubles.

mod http;

pub use http::{HttpGateway, flatten_error_body};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::errors::SaveError;
use crate::field::PersistedField;

/// Server-side description of one field type offered in the type picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTypeDefinition {
    /// Wire name, e.g. `select`
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Attribute keys that must be filled before a field of this type is saved
    #[serde(default)]
    pub required_attributes: Vec<String>,
}

/// Create, update and list persisted fields.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create a field in `collection` (a pipeline).
    async fn create(&self, collection: &str, payload: &Value) -> Result<PersistedField, SaveError>;

    /// Partially update an existing field.
    async fn update(&self, id: i64, payload: &Value) -> Result<PersistedField, SaveError>;

    /// Every persisted field of `collection`.
    async fn list(&self, collection: &str) -> Result<Vec<PersistedField>, SaveError>;

    /// Field types the backend supports.
    async fn field_types(&self) -> Result<Vec<FieldTypeDefinition>, SaveError>;
}

#[async_trait]
impl<G: PersistenceGateway + ?Sized> PersistenceGateway for Arc<G> {
    async fn create(&self, collection: &str, payload: &Value) -> Result<PersistedField, SaveError> {
        (**self).create(collection, payload).await
    }

    async fn update(&self, id: i64, payload: &Value) -> Result<PersistedField, SaveError> {
        (**self).update(id, payload).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<PersistedField>, SaveError> {
        (**self).list(collection).await
    }

    async fn field_types(&self) -> Result<Vec<FieldTypeDefinition>, SaveError> {
        (**self).field_types().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_definition_defaults() {
        let json = r#"{"key": "select", "label": "Dropdown"}"#;
        let def: FieldTypeDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.key, "select");
        assert!(def.description.is_none());
        assert!(def.required_attributes.is_empty());
    }

    #[test]
    fn test_field_type_definition_with_requirements() {
        let json = r#"{
            "key": "ai",
            "label": "AI field",
            "description": "Generated from a prompt",
            "required_attributes": ["prompt"]
        }"#;
        let def: FieldTypeDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.required_attributes, vec!["prompt".to_string()]);
        assert_eq!(def.description.as_deref(), Some("Generated from a prompt"));
    }
}
