// src/document.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "_createdAt";
pub const UPDATED_AT_FIELD: &str = "_updatedAt";

/// Fields owned by the store, never taken from caller data
pub const SYSTEM_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Stored record: caller data `T` plus the three system fields.
///
/// On the wire the caller's fields sit next to the system ones:
/// `{"_id": "...", "_createdAt": "...", "_updatedAt": "...", "name": "Alice"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    #[serde(rename = "_id")]
    pub id: DocumentId,

    #[serde(rename = "_createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "_updatedAt")]
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub data: T,
}

/// Document identifier (UUID v4 string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new() -> Self {
        DocumentId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId(value.to_string())
    }
}

impl<T: Serialize + DeserializeOwned> Document<T> {
    pub fn get_id(&self) -> &DocumentId {
        &self.id
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Build the stored JSON object for a fresh document.
///
/// System fields go first; caller fields with reserved names are dropped.
pub(crate) fn stamp(id: &DocumentId, now: DateTime<Utc>, fields: Map<String, Value>) -> Value {
    let timestamp = timestamp_value(now);
    let mut stored = Map::with_capacity(fields.len() + SYSTEM_FIELDS.len());
    stored.insert(ID_FIELD.to_string(), Value::String(id.as_str().to_string()));
    stored.insert(CREATED_AT_FIELD.to_string(), timestamp.clone());
    stored.insert(UPDATED_AT_FIELD.to_string(), timestamp);

    for (key, value) in fields {
        if !is_system_field(&key) {
            stored.insert(key, value);
        }
    }
    Value::Object(stored)
}

/// Shallow merge of `patch` into a stored document, refreshing `_updatedAt`.
///
/// System fields in the patch are ignored so `_id` and `_createdAt` never move.
/// `_updatedAt` never goes backwards, even if the clock does.
pub(crate) fn merge_patch(stored: &mut Map<String, Value>, patch: &Map<String, Value>, now: DateTime<Utc>) {
    for (key, value) in patch {
        if !is_system_field(key) {
            stored.insert(key.clone(), value.clone());
        }
    }
    let updated_at = match stored_timestamp(stored, UPDATED_AT_FIELD) {
        Some(prior) if prior > now => prior,
        _ => now,
    };
    stored.insert(UPDATED_AT_FIELD.to_string(), timestamp_value(updated_at));
}

fn stored_timestamp(stored: &Map<String, Value>, field: &str) -> Option<DateTime<Utc>> {
    stored
        .get(field)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

pub fn is_system_field(key: &str) -> bool {
    SYSTEM_FIELDS.contains(&key)
}

fn timestamp_value(now: DateTime<Utc>) -> Value {
    // Same representation serde uses for DateTime<Utc>
    serde_json::to_value(now).unwrap_or_else(|_| Value::String(now.to_rfc3339()))
}
