//! Typed error hierarchy for field persistence.
//!
//! `SaveError` covers every way a save attempt can end without a persisted
//! field. Whether an error reaches the user depends on the identity of the
//! field being saved, see [`SaveError::is_user_visible`].

use thiserror::Error;

use crate::field::Identity;

/// Why the classifier refused to send a field to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotEligibleReason {
    /// Name is blank or still one of the generated placeholder names
    ReservedName,
    /// A persisted sibling already carries this name
    DuplicateName,
    /// No field type has been chosen yet
    KindUnchosen,
    /// The chosen type is missing its required configuration
    Incomplete,
    /// The caller-supplied validator rejected a draft
    ValidatorRejected,
}

impl NotEligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReservedName => "reserved_name",
            Self::DuplicateName => "duplicate_name",
            Self::KindUnchosen => "kind_unchosen",
            Self::Incomplete => "incomplete",
            Self::ValidatorRejected => "validator_rejected",
        }
    }
}

impl std::fmt::Display for NotEligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a single save attempt.
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    #[error("Validation rejected: {}", messages.join("; "))]
    ValidationRejected { messages: Vec<String> },

    /// A colliding create was redirected to an existing field and the
    /// backend rejected that update
    #[error("Update of existing field {existing_id} rejected: {}", messages.join("; "))]
    MergeRejected {
        existing_id: i64,
        messages: Vec<String>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Field is not eligible for saving ({0})")]
    NotEligible(NotEligibleReason),

    #[error("A save for {0} is already in flight")]
    AlreadyInFlight(String),

    #[error("Scheduler has been shut down")]
    Closed,
}

impl SaveError {
    /// Shorthand for a validation error with a single message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationRejected {
            messages: vec![message.into()],
        }
    }

    /// Whether this error should reach a UI error surface for a field with
    /// the given identity.
    ///
    /// Transport and server failures always do. Validation failures only do
    /// for fields that already exist on the server; drafts that are still
    /// being composed never produce error noise. A rejected merge targeted a
    /// persisted field, so it is shown whatever identity the attempt started from.
    pub fn is_user_visible(&self, identity: &Identity) -> bool {
        match self {
            Self::Transport(_) | Self::Server { .. } | Self::MergeRejected { .. } => true,
            Self::ValidationRejected { .. } => identity.is_durable(),
            Self::NotEligible(_) | Self::AlreadyInFlight(_) | Self::Closed => false,
        }
    }

    /// The backend refused the payload itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationRejected { .. } | Self::MergeRejected { .. })
    }
}

impl From<reqwest::Error> for SaveError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
