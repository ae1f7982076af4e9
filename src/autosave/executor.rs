//! A single save attempt: classify, persist, and recover from name collisions.

use serde::Serialize;

use crate::classifier::{Classification, FieldValidator, classify_with};
use crate::errors::SaveError;
use crate::field::{EditableField, Identity, PersistedField};
use crate::gateway::PersistenceGateway;
use crate::resolver::{ConflictResolver, is_name_collision};

/// Which call ended up persisting the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOperation {
    Create,
    Update,
}

/// A field that made it to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// Identity the attempt was made for
    pub identity: Identity,
    pub operation: SaveOperation,
    pub field: PersistedField,
    /// Id of the existing field a colliding create was redirected to
    pub resolved_conflict: Option<i64>,
}

/// Runs save attempts against one collection.
pub struct SaveExecutor<'a, G: PersistenceGateway + ?Sized> {
    gateway: &'a G,
    collection: &'a str,
    validator: &'a dyn FieldValidator,
}

impl<'a, G: PersistenceGateway + ?Sized> SaveExecutor<'a, G> {
    pub fn new(gateway: &'a G, collection: &'a str, validator: &'a dyn FieldValidator) -> Self {
        Self {
            gateway,
            collection,
            validator,
        }
    }

    /// Classify `field` against `siblings` and persist it if eligible.
    pub async fn run(
        &self,
        field: &EditableField,
        siblings: &[EditableField],
    ) -> Result<SaveOutcome, SaveError> {
        let classification = classify_with(field, siblings, self.validator)?;
        let payload = field.payload();

        if let Classification::NotEligible(reason) = classification {
            return Err(SaveError::NotEligible(reason));
        }

        match &field.identity {
            Identity::Durable(id) => {
                let persisted = self.gateway.update(*id, &payload).await?;
                Ok(SaveOutcome {
                    identity: field.identity.clone(),
                    operation: SaveOperation::Update,
                    field: persisted,
                    resolved_conflict: None,
                })
            }
            Identity::Placeholder(_) => match self.gateway.create(self.collection, &payload).await {
                Ok(persisted) => Ok(SaveOutcome {
                    identity: field.identity.clone(),
                    operation: SaveOperation::Create,
                    field: persisted,
                    resolved_conflict: None,
                }),
                Err(err) if is_name_collision(&err) => {
                    let resolved = ConflictResolver::new(self.gateway)
                        .resolve(self.collection, &field.name, &payload, err)
                        .await?;
                    Ok(SaveOutcome {
                        identity: field.identity.clone(),
                        operation: SaveOperation::Update,
                        field: resolved.field,
                        resolved_conflict: Some(resolved.existing_id),
                    })
                }
                Err(err) => Err(err),
            },
        }
    }
}
