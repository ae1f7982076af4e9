//! Field types offered by the backend, cached for the type picker.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, ConfigCache};
use crate::errors::SaveError;
use crate::gateway::{FieldTypeDefinition, PersistenceGateway};

const CATEGORY: &str = "field_types";
const ALL: &str = "all";

/// Reads field types through a [`ConfigCache`].
pub struct FieldTypeCatalog<G: PersistenceGateway> {
    gateway: Arc<G>,
    cache: Arc<ConfigCache>,
    ttl: Duration,
}

impl<G: PersistenceGateway> FieldTypeCatalog<G> {
    pub fn new(gateway: Arc<G>, cache: Arc<ConfigCache>, ttl: Duration) -> Self {
        Self { gateway, cache, ttl }
    }

    fn key() -> CacheKey {
        CacheKey::new(CATEGORY, ALL)
    }

    /// Cached types, fetched from the backend on a miss.
    pub async fn types(&self) -> Result<Vec<FieldTypeDefinition>, SaveError> {
        if let Some(cached) = self.cache.get(&Self::key()) {
            match serde_json::from_value(cached) {
                Ok(types) => return Ok(types),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable cached field types");
                    self.cache.invalidate(&Self::key());
                }
            }
        }
        self.fetch().await
    }

    /// Drop the cached list and fetch it again.
    pub async fn refresh(&self) -> Result<Vec<FieldTypeDefinition>, SaveError> {
        self.invalidate();
        self.fetch().await
    }

    pub fn invalidate(&self) {
        self.cache.invalidate_category(CATEGORY);
    }

    /// Look up one type by wire name.
    pub async fn find(&self, key: &str) -> Result<Option<FieldTypeDefinition>, SaveError> {
        Ok(self.types().await?.into_iter().find(|t| t.key == key))
    }

    async fn fetch(&self) -> Result<Vec<FieldTypeDefinition>, SaveError> {
        let types = self.gateway.field_types().await?;
        match serde_json::to_value(&types) {
            Ok(value) => self.cache.put(Self::key(), value, Some(self.ttl)),
            Err(e) => tracing::warn!(error = %e, "Could not cache field types"),
        }
        tracing::debug!(count = types.len(), "Fetched field types");
        Ok(types)
    }
}
