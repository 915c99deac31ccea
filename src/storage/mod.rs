//! Durable client-scoped key/value storage.
//!
//! `KeyValueStore` is the seam between session caching and the backing
//! medium. `FileKeyValueStore` keeps every value encrypted at rest in a single
//! JSON file under `~/.config/fedsign/`; `MemoryKeyValueStore` backs tests and
//! ephemeral runs.

mod crypto;
mod file;
mod memory;

use std::path::PathBuf;

use crate::config::config_root_dir;
use crate::error::StorageError;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

/// Key/value persistence contract used by the session and identity layers.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Store `value` under `key`, replacing any prior value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Remove `key`. Returns `true` when a value was present.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// Default storage file path (`~/.config/fedsign/session.json`) when available.
pub fn default_store_path() -> Option<PathBuf> {
    config_root_dir().map(|dir| dir.join("fedsign").join("session.json"))
}
