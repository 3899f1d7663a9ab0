// shelfbase-core/src/lib.rs
// Typed document collections over a plain key-value store

pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod find_options;
pub mod logging;
pub mod query;
pub mod response;
pub mod storage;
pub mod value_utils;

// Public exports
pub use collection::{Collection, Schema};
pub use config::ShelfConfig;
pub use document::{Document, DocumentId};
pub use error::{Result, ShelfError};
pub use find_options::{OrderBy, ReadManyOptions, SortDirection};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use query::Where;
pub use response::{ErrorCode, Response, Status};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
