//! Remote document store adapter.
//!
//! The remote side is a document collection keyed by the same identifier as
//! the local record table. Documents carry the business fields and the owner,
//! never their own key or a sync status.

mod http;
mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    generate_record_key, validate_field_name, FieldValue, Fields, Record, SyncStatus,
};

pub use http::HttpRemoteStore;
pub use memory::{MemoryRemoteStore, RemoteCallCounts};

/// Owner member name on remote documents.
const OWNER_FIELD: &str = "ownerId";
/// Members written by older clients that are not business fields.
const LEGACY_OWNER_FIELD: &str = "userId";
const LEGACY_KEY_FIELD: &str = "firebaseId";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

impl RemoteError {
    /// Whether a later attempt may succeed without any change on our side.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidPayload(_) | Self::InvalidConfiguration(_) => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A remote document: business fields plus the owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub owner_id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl RemoteDocument {
    /// Project a local record onto its remote document.
    pub fn from_record(record: &Record) -> Self {
        Self {
            owner_id: record.owner_id.clone(),
            fields: record.fields.clone(),
        }
    }

    /// Build a synced local record, stamping the remote key as its id.
    pub fn into_record(self, id: impl Into<String>) -> Record {
        Record {
            id: id.into(),
            owner_id: self.owner_id,
            fields: self.fields,
            sync_status: SyncStatus::Synced,
        }
    }

    /// Parse a JSON document leniently.
    ///
    /// Members that are not valid scalar business fields are dropped.
    pub fn from_json(value: Value) -> RemoteResult<Self> {
        let Value::Object(members) = value else {
            return Err(RemoteError::InvalidPayload(
                "document must be a JSON object".to_string(),
            ));
        };

        let mut owner_id = None;
        let mut legacy_owner_id = None;
        let mut fields = Fields::new();

        for (name, value) in members {
            match name.as_str() {
                OWNER_FIELD => owner_id = value.as_str().map(str::to_string),
                LEGACY_OWNER_FIELD => legacy_owner_id = value.as_str().map(str::to_string),
                LEGACY_KEY_FIELD => {}
                _ if validate_field_name(&name).is_err() => {
                    tracing::debug!("Skipping remote member '{name}'");
                }
                _ => match serde_json::from_value::<FieldValue>(value) {
                    Ok(field) => {
                        fields.insert(name, field);
                    }
                    Err(_) => tracing::debug!("Skipping non-scalar remote member '{name}'"),
                },
            }
        }

        Ok(Self {
            owner_id: owner_id.or(legacy_owner_id).unwrap_or_default(),
            fields,
        })
    }

    pub fn to_json(&self) -> RemoteResult<Value> {
        serde_json::to_value(self).map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }
}

/// Client over the remote document collection.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every document in the collection with its key.
    async fn fetch_all(&self) -> RemoteResult<Vec<(String, RemoteDocument)>>;

    /// A single document; `None` if no such key.
    async fn fetch_one(&self, id: &str) -> RemoteResult<Option<RemoteDocument>>;

    /// Idempotent full replace.
    async fn put(&self, id: &str, document: &RemoteDocument) -> RemoteResult<()>;

    /// Idempotent removal; removing an absent key succeeds.
    async fn remove(&self, id: &str) -> RemoteResult<()>;

    /// A globally unique key, without writing anything.
    fn generate_key(&self) -> String {
        generate_record_key()
    }
}
