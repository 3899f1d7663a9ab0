// storage/file_storage.rs
//! File-backed key-value store
//!
//! One JSON object per storage partition, `{ "<key>": <value>, ... }`.
//! The whole file is loaded on open and rewritten on every `set` through a
//! temp file + rename, so a crash mid-write leaves the previous contents.
//!
//! ```text
//! FileStore (KeyValueStore)
//!      ↓
//! entries: HashMap<String, Value>  (in memory, authoritative after open)
//!      ↓
//! partition.json  (atomic replace per set)
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::error::{Result, ShelfError};
use crate::storage::KeyValueStore;
use crate::{log_debug, log_error, log_trace};

pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
    /// Orders file rewrites; held across the blocking write
    write_gate: Mutex<()>,
}

impl FileStore {
    /// Open the partition at `path`. A missing file is an empty partition;
    /// it is created on the first `set`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            Self::load(&path)?
        } else {
            HashMap::new()
        };

        log_debug!("Opened {} with {} keys", path.display(), entries.len());

        Ok(FileStore {
            path,
            entries: RwLock::new(entries),
            write_gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn load(path: &Path) -> Result<HashMap<String, Value>> {
        let raw = fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let parsed: Value = serde_json::from_str(&raw).map_err(|e| ShelfError::Corruption {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;

        match parsed {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ShelfError::Corruption {
                key: path.display().to_string(),
                reason: format!("expected a JSON object at the top level, found {}", type_name(&other)),
            }),
        }
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ShelfError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        let mut next = self.entries.read().clone();
        next.insert(key.to_string(), value);

        // Sorted keys keep the file diff-friendly
        let mut sorted: Vec<(&String, &Value)> = next.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let body: Map<String, Value> = sorted
            .into_iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&Value::Object(body))?;

        let path = self.path.clone();
        log_trace!("Rewriting {} ({} bytes) for key '{}'", path.display(), bytes.len(), key);

        tokio::task::spawn_blocking(move || Self::write_atomic(&path, &bytes))
            .await
            .map_err(|e| ShelfError::Storage(format!("write task failed: {}", e)))?
            .map_err(|e| {
                log_error!("Failed to persist key '{}': {}", key, e);
                e
            })?;

        *self.entries.write() = next;
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("local.json")).unwrap();
        assert_eq!(store.get("users").await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("users", json!([{"name": "Alice"}])).await.unwrap();
            store.set("settings", json!({"theme": "dark"})).await.unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("users").await.unwrap(),
            Some(json!([{"name": "Alice"}]))
        );
        assert_eq!(reopened.keys(), vec!["settings".to_string(), "users".to_string()]);
    }

    #[test]
    fn test_corrupted_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(ShelfError::Corruption { .. })
        ));

        fs::write(&path, "{not json").unwrap();
        assert!(FileStore::open(&path).is_err());
    }

    #[test]
    fn test_empty_file_is_empty_partition() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        fs::write(&path, "").unwrap();
        assert!(FileStore::open(&path).unwrap().keys().is_empty());
    }
}
