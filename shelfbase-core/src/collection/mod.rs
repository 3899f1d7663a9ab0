// shelfbase-core/src/collection/mod.rs
// Typed document collection over a KeyValueStore
//
// The whole collection lives as one JSON array under its key. Every
// operation loads that array, works on it in memory and (for mutations)
// writes it back in a single `set`.
//
// ├── Constructor: new, open, ensure_exists
// ├── CRUD: create, read, update, remove
// ├── Bulk: create_many, read_many
// ├── Maintenance: count, clear
// └── Private helpers: load, persist, object_fields, to_documents

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{ShelfConfig, DEFAULT_LIMIT, MIN_KEY_LEN};
use crate::document::{self, Document, DocumentId};
use crate::error::{Result, ShelfError};
use crate::find_options::{apply_skip_limit, apply_sort, ReadManyOptions};
use crate::query::exact::position_exact;
use crate::query::matches_where;
use crate::response::Response;
use crate::storage::KeyValueStore;
use crate::{log_debug, log_info, log_trace, log_warn};

mod key_lock;
pub mod schema;

pub use self::schema::Schema;

/// Named collection of `Document<T>` persisted under one storage key.
///
/// Operations never return `Err`: failures come back as an error
/// [`Response`]. Only construction can fail with a [`ShelfError`].
pub struct Collection<T, S: KeyValueStore> {
    key: String,
    store: Arc<S>,
    schema: Option<Schema>,
    default_limit: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: KeyValueStore> Clone for Collection<T, S> {
    fn clone(&self) -> Self {
        Collection {
            key: self.key.clone(),
            store: Arc::clone(&self.store),
            schema: self.schema.clone(),
            default_limit: self.default_limit,
            _marker: PhantomData,
        }
    }
}

impl<T, S> Collection<T, S>
where
    T: Serialize + DeserializeOwned,
    S: KeyValueStore,
{
    // ========== CONSTRUCTOR ==========

    /// Bind a collection to `key` in `store`.
    ///
    /// The key must be longer than three UTF-16 code units and the schema, when
    /// given, must compile. Nothing is written; see [`Collection::open`].
    pub fn new(store: Arc<S>, key: impl Into<String>, schema: Option<Value>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(ShelfError::InvalidCollectionKey(
                "collection key is required".to_string(),
            ));
        }
        // Length in UTF-16 code units, as browser storage hosts count it
        if key.encode_utf16().count() <= MIN_KEY_LEN {
            return Err(ShelfError::InvalidCollectionKey(format!(
                "'{}' must be longer than {} characters",
                key, MIN_KEY_LEN
            )));
        }

        let schema = match schema {
            Some(definition) => Some(Schema::from_value(&definition)?),
            None => None,
        };

        log_debug!(
            "Collection '{}' bound (schema: {})",
            key,
            if schema.is_some() { "yes" } else { "no" }
        );

        Ok(Collection {
            key,
            store,
            schema,
            default_limit: DEFAULT_LIMIT,
            _marker: PhantomData,
        })
    }

    /// [`Collection::new`] followed by [`Collection::ensure_exists`]
    pub async fn open(store: Arc<S>, key: impl Into<String>, schema: Option<Value>) -> Result<Self> {
        let collection = Self::new(store, key, schema)?;
        collection.ensure_exists().await?;
        Ok(collection)
    }

    /// Write an empty array under the key unless something is already there
    pub async fn ensure_exists(&self) -> Result<()> {
        let _guard = key_lock::acquire(&self.key).await;
        if self.store.get(&self.key).await?.is_none() {
            self.store.set(&self.key, Value::Array(Vec::new())).await?;
            log_info!("Initialized empty collection '{}'", self.key);
        }
        Ok(())
    }

    /// Take the `read_many` page size from `config`
    pub fn with_config(self, config: &ShelfConfig) -> Self {
        self.with_default_limit(config.default_limit)
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    // ========== CRUD ==========

    /// Stamp `data` with a fresh id and timestamps and append it
    pub async fn create(&self, data: T) -> Response<Document<T>> {
        let result = self.try_create(data).await;
        self.settle("create", result)
    }

    async fn try_create(&self, data: T) -> Result<Response<Document<T>>> {
        let fields = match object_fields(serde_json::to_value(&data)?) {
            Ok(fields) => fields,
            Err(message) => return Ok(Response::bad_request(message)),
        };

        if let Some(ref schema) = self.schema {
            let issues = schema.validate_object(&fields);
            if !issues.is_empty() {
                return Err(ShelfError::validation(&issues));
            }
        }

        let _guard = key_lock::acquire(&self.key).await;
        let mut docs = self.load().await?;

        let id = DocumentId::new();
        let stored = document::stamp(&id, Utc::now(), fields);
        let created = Document::from_value(stored.clone())?;
        docs.push(stored);
        self.persist(docs).await?;

        log_debug!("Created document {} in '{}'", id, self.key);
        Ok(Response::ok(created, 1))
    }

    /// First document whose top-level fields strictly equal every entry of
    /// `query`
    pub async fn read(&self, query: &Value) -> Response<Document<T>> {
        let result = self.try_read(query).await;
        self.settle("read", result)
    }

    async fn try_read(&self, query: &Value) -> Result<Response<Document<T>>> {
        let query = match query_fields(query) {
            Ok(query) => query,
            Err(message) => return Ok(Response::bad_request(message)),
        };

        let mut docs = self.load().await?;
        match position_exact(&docs, query) {
            Some(pos) => {
                let found = Document::from_value(docs.swap_remove(pos))?;
                Ok(Response::ok(found, 1))
            }
            None => Ok(self.no_match()),
        }
    }

    /// Shallow-merge `patch` into the first matching document and refresh
    /// `_updatedAt`
    pub async fn update(&self, query: &Value, patch: &Value) -> Response<Document<T>> {
        let result = self.try_update(query, patch).await;
        self.settle("update", result)
    }

    async fn try_update(&self, query: &Value, patch: &Value) -> Result<Response<Document<T>>> {
        let query = match query_fields(query) {
            Ok(query) => query,
            Err(message) => return Ok(Response::bad_request(message)),
        };
        let patch = match patch {
            Value::Null => return Ok(Response::bad_request("data is required")),
            Value::Object(patch) => patch,
            _ => return Ok(Response::bad_request("data must be a JSON object")),
        };

        let _guard = key_lock::acquire(&self.key).await;
        let mut docs = self.load().await?;

        let pos = match position_exact(&docs, query) {
            Some(pos) => pos,
            None => return Ok(self.no_match()),
        };

        let stored = docs[pos].as_object_mut().ok_or_else(|| ShelfError::Corruption {
            key: self.key.clone(),
            reason: format!("entry {} is not an object", pos),
        })?;
        document::merge_patch(stored, patch, Utc::now());

        let updated = Document::from_value(docs[pos].clone())?;
        self.persist(docs).await?;

        log_debug!("Updated document {} in '{}'", updated.id, self.key);
        Ok(Response::ok(updated, 1))
    }

    /// Delete the first matching document and return it
    pub async fn remove(&self, query: &Value) -> Response<Document<T>> {
        let result = self.try_remove(query).await;
        self.settle("remove", result)
    }

    async fn try_remove(&self, query: &Value) -> Result<Response<Document<T>>> {
        let query = match query_fields(query) {
            Ok(query) => query,
            Err(message) => return Ok(Response::bad_request(message)),
        };

        let _guard = key_lock::acquire(&self.key).await;
        let mut docs = self.load().await?;

        let pos = match position_exact(&docs, query) {
            Some(pos) => pos,
            None => return Ok(self.no_match()),
        };

        let removed = Document::from_value(docs.remove(pos))?;
        self.persist(docs).await?;

        log_debug!("Removed document {} from '{}'", removed.id, self.key);
        Ok(Response::ok(removed, 1))
    }

    // ========== BULK ==========

    /// Validate every item, then append them all in one write.
    ///
    /// One invalid item rejects the whole batch and nothing is stored.
    pub async fn create_many(&self, data: Vec<T>) -> Response<Vec<Document<T>>> {
        let result = self.try_create_many(data).await;
        self.settle("create_many", result)
    }

    async fn try_create_many(&self, data: Vec<T>) -> Result<Response<Vec<Document<T>>>> {
        if data.is_empty() {
            return Ok(Response::ok(Vec::new(), 0));
        }

        let mut batch = Vec::with_capacity(data.len());
        for (index, item) in data.iter().enumerate() {
            match object_fields(serde_json::to_value(item)?) {
                Ok(fields) => batch.push(fields),
                Err(message) => {
                    return Ok(Response::bad_request(format!("[{}] {}", index, message)));
                }
            }
        }

        if let Some(ref schema) = self.schema {
            let issues: Vec<String> = batch
                .iter()
                .enumerate()
                .flat_map(|(index, fields)| {
                    schema
                        .validate_object(fields)
                        .into_iter()
                        .map(move |issue| format!("[{}] {}", index, issue))
                })
                .collect();
            if !issues.is_empty() {
                return Err(ShelfError::validation(&issues));
            }
        }

        let _guard = key_lock::acquire(&self.key).await;
        let mut docs = self.load().await?;

        let now = Utc::now();
        let stamped: Vec<Value> = batch
            .into_iter()
            .map(|fields| document::stamp(&DocumentId::new(), now, fields))
            .collect();
        let created = to_documents(stamped.clone())?;
        docs.extend(stamped);
        self.persist(docs).await?;

        log_debug!("Created {} documents in '{}'", created.len(), self.key);
        let count = created.len();
        Ok(Response::ok(created, count))
    }

    /// Filter with the condition tree, then sort, skip and limit.
    ///
    /// A bare request (no `where`, `orderBy`, `skip` or `limit`) returns the
    /// whole collection in storage order. Without `where` but with any of the
    /// others, every document is selected and then sorted and paged.
    pub async fn read_many(&self, options: &ReadManyOptions) -> Response<Vec<Document<T>>> {
        let result = self.try_read_many(options).await;
        self.settle("read_many", result)
    }

    async fn try_read_many(&self, options: &ReadManyOptions) -> Result<Response<Vec<Document<T>>>> {
        let docs = self.load().await?;

        let mut selected = match options.where_clause {
            Some(ref where_clause) => {
                where_clause.check()?;
                let mut selected = Vec::new();
                for doc in docs {
                    if matches_where(&doc, where_clause)? {
                        selected.push(doc);
                    }
                }
                selected
            }
            None if is_bare(options) => {
                let all = to_documents(docs)?;
                let count = all.len();
                return Ok(Response::ok(all, count));
            }
            None => docs,
        };
        log_trace!("read_many on '{}' selected {} documents", self.key, selected.len());

        if let Some(ref order_by) = options.order_by {
            apply_sort(&mut selected, order_by);
        }
        let page = apply_skip_limit(
            selected,
            options.skip.unwrap_or(0),
            options.limit.unwrap_or(self.default_limit),
        );

        let page = to_documents(page)?;
        let count = page.len();
        Ok(Response::ok(page, count))
    }

    // ========== MAINTENANCE ==========

    /// Number of stored documents
    pub async fn count(&self) -> Response<usize> {
        let result = self
            .load()
            .await
            .map(|docs| Response::ok(docs.len(), docs.len()));
        self.settle("count", result)
    }

    /// Drop every document; the data is how many were removed
    pub async fn clear(&self) -> Response<usize> {
        let result = self.try_clear().await;
        self.settle("clear", result)
    }

    async fn try_clear(&self) -> Result<Response<usize>> {
        let _guard = key_lock::acquire(&self.key).await;
        let removed = self.load().await?.len();
        self.persist(Vec::new()).await?;
        log_info!("Cleared {} documents from '{}'", removed, self.key);
        Ok(Response::ok(removed, removed))
    }

    // ========== PRIVATE HELPERS ==========

    async fn load(&self) -> Result<Vec<Value>> {
        match self.store.get(&self.key).await? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(docs)) => Ok(docs),
            Some(other) => Err(ShelfError::Corruption {
                key: self.key.clone(),
                reason: format!("expected an array, found {}", json_kind(&other)),
            }),
        }
    }

    async fn persist(&self, docs: Vec<Value>) -> Result<()> {
        log_trace!("Persisting {} documents to '{}'", docs.len(), self.key);
        self.store.set(&self.key, Value::Array(docs)).await
    }

    fn no_match<R>(&self) -> Response<R> {
        Response::not_found(format!("No document in '{}' matches the query", self.key))
    }

    fn settle<R>(&self, op: &str, result: Result<Response<R>>) -> Response<R> {
        match result {
            Ok(response) => {
                if !response.is_ok() {
                    log_debug!(
                        "{} on '{}' rejected: {}",
                        op,
                        self.key,
                        response.message.as_deref().unwrap_or("")
                    );
                }
                response
            }
            Err(err) => {
                log_warn!("{} on '{}' failed: {}", op, self.key, err);
                err.into()
            }
        }
    }
}

/// Caller data as a field map, or why it was refused
fn object_fields(value: Value) -> std::result::Result<Map<String, Value>, String> {
    match value {
        Value::Object(fields) => Ok(fields),
        Value::Null => Err("data is required".to_string()),
        other => Err(format!("data must be a JSON object, got {}", json_kind(&other))),
    }
}

fn query_fields(query: &Value) -> std::result::Result<&Map<String, Value>, String> {
    query
        .as_object()
        .ok_or_else(|| format!("query must be a JSON object, got {}", json_kind(query)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_bare(options: &ReadManyOptions) -> bool {
    options.where_clause.is_none()
        && options.order_by.is_none()
        && options.skip.is_none()
        && options.limit.is_none()
}

fn to_documents<T: Serialize + DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<Document<T>>> {
    docs.into_iter().map(Document::from_value).collect()
}
