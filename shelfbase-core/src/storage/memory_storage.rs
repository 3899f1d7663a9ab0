// storage/memory_storage.rs
//! In-memory key-value store
//!
//! Backs unit tests and hosts that keep everything in process. Nothing
//! survives a drop.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::Result;
use crate::storage::KeyValueStore;

/// `HashMap<String, Value>` behind a read-write lock
///
/// ```ignore
/// use shelfbase_core::storage::MemoryStore;
///
/// let store = MemoryStore::new();
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        MemoryStore {
            entries: RwLock::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Copy of the raw value under `key`, bypassing the async interface
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Copy of every entry
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}
