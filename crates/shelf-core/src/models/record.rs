//! Record model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{Error, Result};

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid regex"));

/// Field names owned by the sync engine; business fields may not shadow them.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "ownerId", "syncStatus"];

/// Business fields of a record, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Divergence between a local record and its remote projection.
///
/// Persisted as the integers `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Local state matches what was last pushed successfully.
    #[default]
    Synced,
    /// Created locally, never pushed.
    PendingInsert,
    /// Changed locally since the last successful push.
    PendingUpdate,
    /// Removal still has to reach the remote store.
    PendingDelete,
}

impl SyncStatus {
    /// All statuses, in drain order after `Synced`.
    pub const ALL: [Self; 4] = [
        Self::Synced,
        Self::PendingInsert,
        Self::PendingUpdate,
        Self::PendingDelete,
    ];

    /// Storage representation.
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Synced => 0,
            Self::PendingInsert => 1,
            Self::PendingUpdate => 2,
            Self::PendingDelete => 3,
        }
    }

    /// Parse the storage representation.
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Synced),
            1 => Some(Self::PendingInsert),
            2 => Some(Self::PendingUpdate),
            3 => Some(Self::PendingDelete),
            _ => None,
        }
    }

    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Synced)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::PendingInsert => "pending-insert",
            Self::PendingUpdate => "pending-update",
            Self::PendingDelete => "pending-delete",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown sync status '{s}'")))
    }
}

/// A scalar business field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Parse a command-line literal: `null`, `true`/`false`, integers, floats,
    /// and anything else as text.
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "null" {
            return Self::Null;
        }
        if let Ok(value) = trimmed.parse::<bool>() {
            return Self::Bool(value);
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::Integer(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return Self::Float(value);
            }
        }
        Self::Text(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A domain record cached locally and replicated to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier; empty until assigned.
    pub id: String,
    /// Owning user, used only for local filtering.
    pub owner_id: String,
    /// Business fields, opaque to the sync engine.
    pub fields: Fields,
    /// Pending-mutation marker.
    pub sync_status: SyncStatus,
}

impl Record {
    /// Create an unassigned record owned by `owner_id`.
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.into(),
            fields: Fields::new(),
            sync_status: SyncStatus::Synced,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = status;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Equal in everything the caller controls, ignoring `id` and status.
    pub fn same_content(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id && self.fields == other.fields
    }

    /// Check that the record can be written to the local store.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "record id must be assigned before it is stored".to_string(),
            ));
        }
        for name in self.fields.keys() {
            validate_field_name(name)?;
        }
        Ok(())
    }
}

/// Validate a business field name.
///
/// Names become document member names on the remote store, so they are
/// limited to `[A-Za-z_][A-Za-z0-9_-]*` and may not use a reserved name.
pub fn validate_field_name(name: &str) -> Result<()> {
    if RESERVED_FIELDS.contains(&name) {
        return Err(Error::InvalidInput(format!(
            "field name '{name}' is reserved"
        )));
    }
    if !FIELD_NAME.is_match(name) {
        return Err(Error::InvalidInput(format!(
            "invalid field name '{name}'"
        )));
    }
    Ok(())
}

/// Generate a locally unique, time-sortable record key.
///
/// Used both by the remote key generators and as the offline placeholder id,
/// so a record created offline keeps its id forever.
pub fn generate_record_key() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sync_status_storage_roundtrip() {
        for status in SyncStatus::ALL {
            assert_eq!(SyncStatus::from_i64(status.as_i64()), Some(status));
        }
        assert_eq!(SyncStatus::from_i64(7), None);
    }

    #[test]
    fn sync_status_parses_display_names() {
        assert_eq!(
            "pending-update".parse::<SyncStatus>().unwrap(),
            SyncStatus::PendingUpdate
        );
        assert!("later".parse::<SyncStatus>().is_err());
        assert!(!SyncStatus::Synced.is_pending());
        assert!(SyncStatus::PendingDelete.is_pending());
    }

    #[test]
    fn field_value_parses_literals() {
        assert_eq!(FieldValue::parse_literal("null"), FieldValue::Null);
        assert_eq!(FieldValue::parse_literal("true"), FieldValue::Bool(true));
        assert_eq!(FieldValue::parse_literal("42"), FieldValue::Integer(42));
        assert_eq!(FieldValue::parse_literal("12.5"), FieldValue::Float(12.5));
        assert_eq!(
            FieldValue::parse_literal("Calculus"),
            FieldValue::Text("Calculus".to_string())
        );
        assert_eq!(
            FieldValue::parse_literal("NaN"),
            FieldValue::Text("NaN".to_string())
        );
    }

    #[test]
    fn field_value_json_shape_is_plain_scalar() {
        let record = Record::new("u1")
            .with_id("b1")
            .with_field("title", "Algebra")
            .with_field("price", 12.5)
            .with_field("author", None::<String>);

        let json = serde_json::to_value(&record.fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"author": null, "price": 12.5, "title": "Algebra"})
        );

        let parsed: Fields = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record.fields);
    }

    #[test]
    fn validate_rejects_missing_id() {
        let record = Record::new("u1").with_field("title", "X");
        assert!(matches!(record.validate(), Err(Error::InvalidInput(_))));
        assert!(record.clone().with_id("b1").validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_field_names() {
        assert!(validate_field_name("imageUrl").is_ok());
        assert!(validate_field_name("ownerId").is_err());
        assert!(validate_field_name("a.b").is_err());
        assert!(validate_field_name("9lives").is_err());

        let record = Record::new("u1").with_id("b1").with_field("$bad", 1_i64);
        assert!(record.validate().is_err());
    }

    #[test]
    fn same_content_ignores_id_and_status() {
        let a = Record::new("u1").with_field("title", "X");
        let b = a
            .clone()
            .with_id("b1")
            .with_status(SyncStatus::PendingInsert);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&b.with_field("title", "Y")));
    }

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(generate_record_key(), generate_record_key());
    }
}
