//! Save eligibility for field drafts.
//!
//! Classification runs right before a save attempt, against a fresh snapshot
//! of every field on the screen:
//!
//! 1. A durable field is always an `Update` (the validator may still veto it).
//! 2. A placeholder draft is a `Create` only once it has a real name, no
//!    persisted sibling already uses that name, a chosen type, and whatever
//!    configuration that type needs.
//!
//! Anything else is `NotEligible` and never reaches the network.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::{NotEligibleReason, SaveError};
use crate::field::{EditableField, FieldKind, OPTIONS_KEY, PROMPT_KEY, TARGET_KEY};

/// Names the UI hands out to freshly added rows.
pub const RESERVED_NAMES: &[&str] = &[
    "New Field",
    "New field",
    "Untitled Field",
    "Untitled field",
    "Untitled",
    "Unnamed Field",
];

// Generated "<Type> <n>" names such as "Text 3" or "Multiselect 12".
static GENERATED_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(text|textarea|number|decimal|date|datetime|boolean|email|phone|url|select|multiselect|relation|ai|field)\s+\d+$",
    )
    .unwrap()
});

/// Outcome of classifying one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NotEligible(NotEligibleReason),
    Create,
    Update,
}

impl Classification {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Self::NotEligible(_))
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEligible(reason) => write!(f, "not-eligible ({})", reason),
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// Verdict of a caller-supplied validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// The user is still filling the field in; never reported
    Incomplete(String),
    /// A real business-rule violation
    Invalid(String),
}

/// Cross-field checks layered on top of the built-in rules.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, field: &EditableField, siblings: &[EditableField]) -> Verdict;
}

/// Validator that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FieldValidator for AcceptAll {
    fn validate(&self, _field: &EditableField, _siblings: &[EditableField]) -> Verdict {
        Verdict::Valid
    }
}

impl<F> FieldValidator for F
where
    F: Fn(&EditableField, &[EditableField]) -> Verdict + Send + Sync,
{
    fn validate(&self, field: &EditableField, siblings: &[EditableField]) -> Verdict {
        self(field, siblings)
    }
}

/// Whether a name is blank or one the UI generated.
pub fn is_reserved_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || RESERVED_NAMES.contains(&trimmed)
        || GENERATED_NAME_REGEX.is_match(trimmed)
}

/// Whether a persisted sibling (not `field`, not another draft) already uses
/// `field`'s name under any of its synonyms.
pub fn collides_with_sibling(field: &EditableField, siblings: &[EditableField]) -> bool {
    siblings
        .iter()
        .filter(|s| s.identity.is_durable() && s.identity != field.identity)
        .any(|s| s.names().any(|n| n == field.name))
}

/// Type-specific configuration required before a draft can be created.
pub fn kind_is_complete(field: &EditableField) -> bool {
    match &field.kind {
        Some(FieldKind::Select) | Some(FieldKind::Multiselect) => field
            .attributes
            .get(OPTIONS_KEY)
            .and_then(|v| v.as_array())
            .is_some_and(|opts| !opts.is_empty()),
        Some(FieldKind::Relation) => field
            .attributes
            .get(TARGET_KEY)
            .is_some_and(|target| match target {
                serde_json::Value::Null => false,
                serde_json::Value::String(s) => !s.trim().is_empty(),
                _ => true,
            }),
        Some(FieldKind::Ai) => field
            .attributes
            .get(PROMPT_KEY)
            .and_then(|v| v.as_str())
            .is_some_and(|prompt| !prompt.trim().is_empty()),
        Some(FieldKind::Unchosen) | None => false,
        Some(_) => true,
    }
}

/// Apply the built-in rules only.
pub fn classify(field: &EditableField, siblings: &[EditableField]) -> Classification {
    if field.identity.is_durable() {
        return Classification::Update;
    }
    if is_reserved_name(&field.name) {
        return Classification::NotEligible(NotEligibleReason::ReservedName);
    }
    if collides_with_sibling(field, siblings) {
        return Classification::NotEligible(NotEligibleReason::DuplicateName);
    }
    match &field.kind {
        None | Some(FieldKind::Unchosen) => {
            return Classification::NotEligible(NotEligibleReason::KindUnchosen);
        }
        Some(_) => {}
    }
    if !kind_is_complete(field) {
        return Classification::NotEligible(NotEligibleReason::Incomplete);
    }
    Classification::Create
}

/// Apply the built-in rules, then the validator.
///
/// Returns `Err` only when the validator calls a durable field invalid; that
/// is the one classifier outcome the user gets to see. Drafts the validator
/// rejects are quietly `NotEligible`.
pub fn classify_with(
    field: &EditableField,
    siblings: &[EditableField],
    validator: &dyn FieldValidator,
) -> Result<Classification, SaveError> {
    let classification = classify(field, siblings);
    if !classification.is_eligible() {
        return Ok(classification);
    }

    match validator.validate(field, siblings) {
        Verdict::Valid => Ok(classification),
        Verdict::Incomplete(reason) => {
            tracing::debug!(identity = %field.identity, %reason, "Validator reports incomplete field");
            Ok(Classification::NotEligible(NotEligibleReason::Incomplete))
        }
        Verdict::Invalid(message) if field.identity.is_durable() => {
            Err(SaveError::validation(message))
        }
        Verdict::Invalid(message) => {
            tracing::debug!(identity = %field.identity, %message, "Validator rejected draft");
            Ok(Classification::NotEligible(NotEligibleReason::ValidatorRejected))
        }
    }
}
