// src/storage/traits.rs
//! Persistence port for shelfbase
//!
//! Collections never talk to a concrete backend. They receive something that
//! implements [`KeyValueStore`]: the smallest surface a browser-extension
//! style storage area offers, one JSON value per string key.
//!
//! ```text
//! KeyValueStore (get / set)
//!   ├── MemoryStore (in-process HashMap, tests and embedding)
//!   └── FileStore   (one JSON file per storage partition)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Opaque key-value persistence.
///
/// Values are whole JSON documents; a collection stores its entire array
/// under its key and rewrites it on every mutation.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`. `Ok(None)` when the key was never set.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value).await
    }
}
