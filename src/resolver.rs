//! Recovery for creates that lose a race against an existing field.
//!
//! A draft can be created from stale state after someone else (or an earlier
//! request from the same screen) already persisted a field with that name.
//! The backend then rejects the create. When that happens the resolver looks
//! the existing field up by name and retries the same payload as an update.
//! It runs once per failed create and never recurses.

use serde_json::Value;

use crate::errors::SaveError;
use crate::field::PersistedField;
use crate::gateway::PersistenceGateway;

/// Substrings (lowercase) that mark a validation message as a name collision.
pub const COLLISION_PATTERNS: &[&str] = &["already exists", "must be unique", "duplicate"];

/// Whether `err` is a validation rejection caused by a duplicate name.
pub fn is_name_collision(err: &SaveError) -> bool {
    match err {
        SaveError::ValidationRejected { messages } => messages.iter().any(|msg| {
            let lower = msg.to_lowercase();
            COLLISION_PATTERNS.iter().any(|p| lower.contains(p))
        }),
        _ => false,
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Id of the field the create collided with
    pub existing_id: i64,
    /// The field as returned by the retried update
    pub field: PersistedField,
}

/// Retries name-colliding creates as updates.
pub struct ConflictResolver<'a, G: PersistenceGateway + ?Sized> {
    gateway: &'a G,
}

impl<'a, G: PersistenceGateway + ?Sized> ConflictResolver<'a, G> {
    pub fn new(gateway: &'a G) -> Self {
        Self { gateway }
    }

    /// Resolve a failed create of `name` in `collection`.
    ///
    /// Returns `original` unchanged when it is not a name collision or when the
    /// colliding field can no longer be found. A transport or server failure
    /// while listing replaces `original`, since it is the real cause. When the
    /// field is found the outcome of the update is the overall outcome.
    pub async fn resolve(
        &self,
        collection: &str,
        name: &str,
        payload: &Value,
        original: SaveError,
    ) -> Result<Resolved, SaveError> {
        if !is_name_collision(&original) {
            return Err(original);
        }

        let existing = match self.gateway.list(collection).await {
            Ok(fields) => fields,
            Err(list_err @ (SaveError::Transport(_) | SaveError::Server { .. })) => {
                tracing::warn!(%name, error = %list_err, "Could not list fields to resolve name collision");
                return Err(list_err);
            }
            Err(list_err) => {
                tracing::warn!(%name, error = %list_err, "Listing rejected while resolving name collision");
                return Err(original);
            }
        };

        let Some(target) = existing.iter().find(|f| f.answers_to(name)) else {
            tracing::debug!(%name, "Colliding field no longer exists; keeping original error");
            return Err(original);
        };

        tracing::warn!(
            %name,
            existing_id = target.id,
            "Create collided with an existing field; retrying as update"
        );
        let existing_id = target.id;
        let field = self
            .gateway
            .update(existing_id, payload)
            .await
            .map_err(|err| match err {
                SaveError::ValidationRejected { messages } => SaveError::MergeRejected {
                    existing_id,
                    messages,
                },
                other => other,
            })?;
        Ok(Resolved {
            existing_id: target.id,
            field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;
    use serde_json::json;

    fn collision() -> SaveError {
        SaveError::validation("name: Field with this name already exists.")
    }

    #[test]
    fn test_collision_patterns_match_case_insensitively() {
        assert!(is_name_collision(&collision()));
        assert!(is_name_collision(&SaveError::validation("Name MUST BE UNIQUE")));
        assert!(is_name_collision(&SaveError::validation("duplicate field name")));
        assert!(!is_name_collision(&SaveError::validation("name: required")));
    }

    #[test]
    fn test_non_validation_errors_are_not_collisions() {
        assert!(!is_name_collision(&SaveError::Transport("already exists".into())));
        assert!(!is_name_collision(&SaveError::Server {
            status: 500,
            body: "already exists".into()
        }));
    }

    #[tokio::test]
    async fn test_collision_retries_as_update_against_matching_field() {
        let gateway = MockGateway::new();
        gateway.seed(MockGateway::persisted(42, "Status"));
        let payload = json!({"name": "Status", "field_type": "select"});

        let resolved = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &payload, collision())
            .await
            .unwrap();

        assert_eq!(resolved.existing_id, 42);
        assert_eq!(gateway.updates(), vec![(42, payload)]);
        assert_eq!(gateway.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_matches_on_display_name_synonym() {
        let gateway = MockGateway::new();
        let mut existing = MockGateway::persisted(7, "status_code");
        existing.display_name = Some("Status".into());
        gateway.seed(existing);

        let resolved = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await
            .unwrap();
        assert_eq!(resolved.existing_id, 7);
    }

    #[tokio::test]
    async fn test_missing_match_returns_original_error() {
        let gateway = MockGateway::new();
        gateway.seed(MockGateway::persisted(1, "Stage"));

        let err = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await
            .unwrap_err();
        assert!(is_name_collision(&err));
        assert!(gateway.updates().is_empty());
    }

    #[tokio::test]
    async fn test_non_collision_does_not_list() {
        let gateway = MockGateway::new();
        let err = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({}), SaveError::validation("name: required"))
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::ValidationRejected { .. }));
        assert_eq!(gateway.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_list_server_failure_replaces_collision_error() {
        let gateway = MockGateway::new();
        gateway.seed(MockGateway::persisted(42, "Status"));
        gateway.fail_lists_with(SaveError::Server {
            status: 503,
            body: "down".into(),
        });

        let err = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Server { status: 503, .. }));
        assert!(gateway.updates().is_empty());
    }

    #[tokio::test]
    async fn test_list_transport_failure_replaces_collision_error() {
        let gateway = MockGateway::new();
        gateway.fail_lists_with(SaveError::Transport("connection reset".into()));

        let err = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Transport(_)));
    }

    #[tokio::test]
    async fn test_update_failure_is_the_overall_outcome() {
        let gateway = MockGateway::new();
        gateway.seed(MockGateway::persisted(42, "Status"));
        gateway.fail_updates_with(SaveError::Server {
            status: 503,
            body: "down".into(),
        });

        let err = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_rejected_update_names_the_existing_field() {
        let gateway = MockGateway::new();
        gateway.seed(MockGateway::persisted(42, "Status"));
        gateway.fail_updates_with(SaveError::validation("field_type: cannot change type"));

        let err = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await
            .unwrap_err();
        match err {
            SaveError::MergeRejected {
                existing_id,
                messages,
            } => {
                assert_eq!(existing_id, 42);
                assert_eq!(messages, vec!["field_type: cannot change type".to_string()]);
            }
            other => panic!("Expected MergeRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_match_is_case_sensitive() {
        let gateway = MockGateway::new();
        gateway.seed(MockGateway::persisted(42, "status"));

        let result = ConflictResolver::new(&gateway)
            .resolve("p1", "Status", &json!({"name": "Status"}), collision())
            .await;
        assert!(result.is_err());
        assert!(gateway.updates().is_empty());
    }
}
