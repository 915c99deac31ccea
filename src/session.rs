//! Single-entry cache for the backend session token.
//!
//! Writes driven by identity events carry the event epoch; a write older than
//! the newest applied epoch is dropped so a late sign-out callback cannot wipe
//! a session stored for a newer sign-in.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// The cached backend session.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedSession {
    pub token: String,
}

impl std::fmt::Debug for CachedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSession")
            .field("token", &"<redacted>")
            .finish()
    }
}

pub struct SessionCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// Newest identity epoch whose write was applied.
    applied_epoch: Mutex<u64>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            applied_epoch: Mutex::new(0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Overwrite the cached token.
    pub fn store(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(&self.key, token)
    }

    /// Remove the cached token. Returns `false` when nothing was cached.
    pub fn clear(&self) -> Result<bool, StorageError> {
        self.store.remove(&self.key)
    }

    pub fn load(&self) -> Result<Option<CachedSession>, StorageError> {
        Ok(self
            .store
            .get(&self.key)?
            .filter(|token| !token.is_empty())
            .map(|token| CachedSession { token }))
    }

    /// Store `token` unless a newer epoch has already been applied.
    ///
    /// Returns whether the write happened.
    pub fn store_for_epoch(&self, epoch: u64, token: &str) -> Result<bool, StorageError> {
        self.apply_if_current(epoch, || self.store(token))
    }

    /// Clear the cache unless a newer epoch has already been applied.
    pub fn clear_for_epoch(&self, epoch: u64) -> Result<bool, StorageError> {
        self.apply_if_current(epoch, || self.clear().map(|_| ()))
    }

    fn apply_if_current<F>(&self, epoch: u64, write: F) -> Result<bool, StorageError>
    where
        F: FnOnce() -> Result<(), StorageError>,
    {
        // Held across the write so check-and-apply is atomic.
        let mut applied = self
            .applied_epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if epoch < *applied {
            tracing::debug!(epoch, applied = *applied, "dropping stale session write");
            return Ok(false);
        }
        write()?;
        *applied = epoch;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;

    fn cache() -> (SessionCache, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        (SessionCache::new(store.clone(), "accessToken"), store)
    }

    #[test]
    fn store_overwrites_and_clear_is_idempotent() {
        let (cache, store) = cache();
        cache.store("one").unwrap();
        cache.store("two").unwrap();
        assert_eq!(cache.load().unwrap().unwrap().token, "two");
        assert_eq!(store.len(), 1);

        assert!(cache.clear().unwrap());
        assert!(!cache.clear().unwrap());
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn stale_epoch_clear_does_not_remove_newer_session() {
        let (cache, _) = cache();
        assert!(cache.store_for_epoch(3, "fresh").unwrap());
        assert!(!cache.clear_for_epoch(2).unwrap());
        assert_eq!(cache.load().unwrap().unwrap().token, "fresh");

        assert!(cache.clear_for_epoch(4).unwrap());
        assert_eq!(cache.load().unwrap(), None);
        assert!(!cache.store_for_epoch(3, "late").unwrap());
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn same_epoch_writes_apply_in_order() {
        let (cache, _) = cache();
        assert!(cache.clear_for_epoch(1).unwrap());
        assert!(cache.store_for_epoch(1, "token").unwrap());
        assert_eq!(cache.load().unwrap().unwrap().token, "token");
    }

    #[test]
    fn debug_hides_token() {
        let session = CachedSession {
            token: "secret-token".to_string(),
        };
        assert!(!format!("{session:?}").contains("secret-token"));
    }
}
