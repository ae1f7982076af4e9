//! Client-side field drafts and the server entities they persist to.
//!
//! An [`EditableField`] is either a draft the server has never seen
//! (placeholder identity) or a local copy of a persisted field (durable
//! identity). Which one it is decides how the classifier treats it and
//! whether validation errors are shown to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Attribute key holding the option list of select fields.
pub const OPTIONS_KEY: &str = "options";
/// Attribute key holding the target reference of relation fields.
pub const TARGET_KEY: &str = "target";
/// Attribute key holding the prompt text of AI fields.
pub const PROMPT_KEY: &str = "prompt";

/// Client-generated identifier for a field that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderId(String);

impl PlaceholderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh `tmp-<uuid>` identifier.
    pub fn generate() -> Self {
        Self(format!("tmp-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an editable field.
///
/// On the wire a durable identity is the server's numeric id and a
/// placeholder is a string, so `42` and `"tmp-…"` are told apart by type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    /// Server-assigned id; the field has been persisted at least once
    Durable(i64),
    /// Client-generated id; the field exists only in local state
    Placeholder(PlaceholderId),
}

impl Identity {
    /// A fresh placeholder identity.
    pub fn placeholder() -> Self {
        Self::Placeholder(PlaceholderId::generate())
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    pub fn durable_id(&self) -> Option<i64> {
        match self {
            Self::Durable(id) => Some(*id),
            Self::Placeholder(_) => None,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Durable(id) => write!(f, "{}", id),
            Self::Placeholder(tmp) => write!(f, "{}", tmp),
        }
    }
}

/// Field type discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    /// Sentinel sent by the type picker before a choice is made
    Unchosen,
    Text,
    Textarea,
    Number,
    Decimal,
    Date,
    Datetime,
    Boolean,
    Email,
    Phone,
    Url,
    Select,
    Multiselect,
    Relation,
    Ai,
    /// A type this client does not know about; passed through as-is
    Other(String),
}

/// Kinds with a fixed wire name, in picker order.
pub const KNOWN_KINDS: &[FieldKind] = &[
    FieldKind::Text,
    FieldKind::Textarea,
    FieldKind::Number,
    FieldKind::Decimal,
    FieldKind::Date,
    FieldKind::Datetime,
    FieldKind::Boolean,
    FieldKind::Email,
    FieldKind::Phone,
    FieldKind::Url,
    FieldKind::Select,
    FieldKind::Multiselect,
    FieldKind::Relation,
    FieldKind::Ai,
];

impl FieldKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unchosen => "",
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Relation => "relation",
            Self::Ai => "ai",
            Self::Other(name) => name,
        }
    }

    pub fn is_chosen(&self) -> bool {
        !matches!(self, Self::Unchosen)
    }
}

impl From<&str> for FieldKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "select_type" | "unselected" => Self::Unchosen,
            "text" => Self::Text,
            "textarea" => Self::Textarea,
            "number" => Self::Number,
            "decimal" => Self::Decimal,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            "boolean" => Self::Boolean,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "url" => Self::Url,
            "select" => Self::Select,
            "multiselect" => Self::Multiselect,
            "relation" => Self::Relation,
            "ai" => Self::Ai,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for FieldKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group membership of a field.
///
/// `Unset` means the draft never touched its group and the payload leaves
/// the server's value alone. `Ungrouped` explicitly clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupRef {
    #[default]
    Unset,
    Ungrouped,
    Group(i64),
}

impl GroupRef {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    fn to_json(self) -> Option<Value> {
        match self {
            Self::Unset => None,
            Self::Ungrouped => Some(Value::Null),
            Self::Group(id) => Some(Value::from(id)),
        }
    }
}

impl Serialize for GroupRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Group(id) => serializer.serialize_i64(*id),
            Self::Unset | Self::Ungrouped => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for GroupRef {
    // Only called when the key is present; a missing key falls back to `Unset`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<i64>::deserialize(deserializer)? {
            Some(id) => Self::Group(id),
            None => Self::Ungrouped,
        })
    }
}

/// A client-side draft of a field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableField {
    /// A missing `id` means a brand-new draft
    #[serde(rename = "id", default = "Identity::placeholder")]
    pub identity: Identity,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "field_type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    #[serde(default, rename = "field_config")]
    pub attributes: Map<String, Value>,
    #[serde(default, rename = "field_group", skip_serializing_if = "GroupRef::is_unset")]
    pub group: GroupRef,
}

impl EditableField {
    /// A new draft with a fresh placeholder identity.
    pub fn draft(name: impl Into<String>, kind: Option<FieldKind>) -> Self {
        Self::with_identity(Identity::placeholder(), name, kind)
    }

    /// A local copy of a persisted field.
    pub fn existing(id: i64, name: impl Into<String>, kind: FieldKind) -> Self {
        Self::with_identity(Identity::Durable(id), name, Some(kind))
    }

    pub fn with_identity(identity: Identity, name: impl Into<String>, kind: Option<FieldKind>) -> Self {
        Self {
            identity,
            name: name.into(),
            display_name: None,
            label: None,
            kind,
            attributes: Map::new(),
            group: GroupRef::Unset,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_group(mut self, group: GroupRef) -> Self {
        self.group = group;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Name, display name and label: the synonyms a name collision is checked against.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        name_synonyms(&self.name, self.display_name.as_deref(), self.label.as_deref())
    }

    /// JSON body for create and update calls. The identity is never part of it.
    pub fn payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("name".into(), Value::from(self.name.clone()));
        if let Some(display_name) = &self.display_name {
            body.insert("display_name".into(), Value::from(display_name.clone()));
        }
        if let Some(label) = &self.label {
            body.insert("label".into(), Value::from(label.clone()));
        }
        if let Some(kind) = &self.kind {
            body.insert("field_type".into(), Value::from(kind.as_str()));
        }
        body.insert("field_config".into(), Value::Object(self.attributes.clone()));
        if let Some(group) = self.group.to_json() {
            body.insert("field_group".into(), group);
        }
        Value::Object(body)
    }
}

/// A field as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedField {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub field_config: Map<String, Value>,
    #[serde(default)]
    pub field_group: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersistedField {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        name_synonyms(&self.name, self.display_name.as_deref(), self.label.as_deref())
    }

    /// Exact, case-sensitive match against any of the name synonyms.
    pub fn answers_to(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    /// Convert back into an editable copy with a durable identity.
    pub fn to_editable(&self) -> EditableField {
        EditableField {
            identity: Identity::Durable(self.id),
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            label: self.label.clone(),
            kind: self.field_type.as_deref().map(FieldKind::from),
            attributes: self.field_config.clone(),
            group: match self.field_group {
                Some(id) => GroupRef::Group(id),
                None => GroupRef::Ungrouped,
            },
        }
    }
}

fn name_synonyms<'a>(
    name: &'a str,
    display_name: Option<&'a str>,
    label: Option<&'a str>,
) -> impl Iterator<Item = &'a str> {
    std::iter::once(name)
        .chain(display_name)
        .chain(label)
        .filter(|n| !n.is_empty())
}
