// src/storage/mod.rs
pub mod file_storage;
pub mod memory_storage;
pub mod traits;

pub use file_storage::FileStore;
pub use memory_storage::MemoryStore;
pub use traits::KeyValueStore;
