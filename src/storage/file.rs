//! Encrypted single-file key/value store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::crypto::{open_entries, seal_entries, DataKey, EncryptedStoreFile, DEFAULT_KDF_LOG_N};
use super::KeyValueStore;
use crate::error::StorageError;

/// Key/value store persisted as one encrypted JSON file.
///
/// Every mutation rewrites the whole file; the data set is a handful of
/// short strings. The in-process mutex serializes read-modify-write cycles
/// and holds the unwrapped data key, so scrypt runs once per instance
/// unless another process replaces the file's key envelope.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    kdf_log_n: u8,
    data_key: Mutex<Option<DataKey>>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf_log_n: DEFAULT_KDF_LOG_N,
            data_key: Mutex::new(None),
        }
    }

    /// Override the scrypt cost exponent used when creating a new file key.
    pub fn with_kdf_log_n(mut self, log_n: u8) -> Self {
        self.kdf_log_n = log_n;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(
        &self,
        data_key: &mut Option<DataKey>,
    ) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let file: EncryptedStoreFile = serde_json::from_str(&text).map_err(|err| {
                    StorageError::Invalid(format!(
                        "failed to parse storage file `{}`: {err}",
                        self.path.display()
                    ))
                })?;
                let (entries, key) = open_entries(&file, data_key.as_ref())?;
                *data_key = Some(key);
                Ok(entries)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn write_entries(
        &self,
        entries: &BTreeMap<String, String>,
        data_key: &mut Option<DataKey>,
    ) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let key = match data_key.take() {
            Some(key) => key,
            None => DataKey::generate(self.kdf_log_n)?,
        };
        let sealed = seal_entries(entries, &key);
        *data_key = Some(key);
        let sealed = sealed?;
        let text = serde_json::to_string_pretty(&sealed).map_err(|err| {
            StorageError::Invalid(format!("failed to serialize storage file: {err}"))
        })?;
        let mut options = std::fs::OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut data_key = self.data_key.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries(&mut data_key)?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data_key = self.data_key.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries(&mut data_key)?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries, &mut data_key)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut data_key = self.data_key.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries(&mut data_key)?;
        let removed = entries.remove(key).is_some();
        if removed {
            self.write_entries(&entries, &mut data_key)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestTempDir;

    fn store_in(dir: &TestTempDir) -> FileKeyValueStore {
        FileKeyValueStore::new(dir.child("fedsign/session.json")).with_kdf_log_n(4)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TestTempDir::new("storage-missing");
        let store = store_in(&dir);
        assert_eq!(store.get("accessToken").unwrap(), None);
        assert!(!store.remove("accessToken").unwrap());
        assert!(!store.path().exists(), "remove of absent key must not create the file");
    }

    #[test]
    fn values_persist_across_instances_without_plaintext_on_disk() {
        let dir = TestTempDir::new("storage-persist");
        store_in(&dir).set("accessToken", "plain-token-value").unwrap();

        let raw = std::fs::read_to_string(dir.child("fedsign/session.json")).unwrap();
        assert!(raw.contains("\"encryption\""), "raw: {raw}");
        assert!(!raw.contains("plain-token-value"), "token leaked to disk");

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get("accessToken").unwrap().as_deref(),
            Some("plain-token-value")
        );
    }

    fn envelope_salt(dir: &TestTempDir) -> String {
        let raw = std::fs::read_to_string(dir.child("fedsign/session.json")).unwrap();
        let file: serde_json::Value = serde_json::from_str(&raw).unwrap();
        file["encryption"]["salt"].as_str().unwrap().to_string()
    }

    #[test]
    fn rewrites_keep_the_wrapped_data_key() {
        let dir = TestTempDir::new("storage-rewrap");
        let store = store_in(&dir);
        store.set("accessToken", "a").unwrap();
        let salt = envelope_salt(&dir);
        store.set("externalSession", "b").unwrap();
        assert!(store.remove("accessToken").unwrap());
        assert_eq!(envelope_salt(&dir), salt);

        let reopened = store_in(&dir);
        reopened.set("accessToken", "c").unwrap();
        assert_eq!(envelope_salt(&dir), salt);
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("c"));
        assert_eq!(store.get("externalSession").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn replaced_file_is_reopened_with_its_own_key() {
        let dir = TestTempDir::new("storage-replaced");
        let store = store_in(&dir);
        store.set("accessToken", "old").unwrap();

        std::fs::remove_file(dir.child("fedsign/session.json")).unwrap();
        let other = store_in(&dir);
        other.set("accessToken", "new").unwrap();

        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn remove_only_drops_the_named_key() {
        let dir = TestTempDir::new("storage-remove");
        let store = store_in(&dir);
        store.set("accessToken", "a").unwrap();
        store.set("externalSession", "b").unwrap();

        assert!(store.remove("accessToken").unwrap());
        assert_eq!(store.get("accessToken").unwrap(), None);
        assert_eq!(store.get("externalSession").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn unparseable_file_surfaces_invalid_error() {
        let dir = TestTempDir::new("storage-corrupt");
        dir.write_text("fedsign/session.json", "not json");
        let err = store_in(&dir).get("accessToken").expect_err("corrupt file");
        assert!(err.to_string().contains("failed to parse storage file"));
    }
}
