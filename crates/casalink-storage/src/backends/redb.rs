//! Redb `KvStore` backend.
//!
//! Persistent TTL-bearing storage on the redb embedded database. Entries
//! carry an absolute expiry instant; reads lazily evict expired entries
//! and `purge_expired` sweeps the rest.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use casalink_core::error::{Error, Result};
use casalink_core::kv::KvStore;

use super::Entry;

const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("casalink_kv");

/// Configuration for `RedbKvStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedbKvStoreConfig {
    /// Path to the database file, or `:memory:` for a throwaway temp file.
    pub path: String,

    /// Create parent directories if they don't exist.
    #[serde(default = "default_create_dirs")]
    pub create_dirs: bool,
}

fn default_create_dirs() -> bool {
    true
}

impl RedbKvStoreConfig {
    /// Create a new config with the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_dirs: true,
        }
    }

    /// Set whether to create parent directories.
    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    /// Create a config backed by a temporary file.
    pub fn memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            create_dirs: false,
        }
    }
}

/// redb-based persistent key-value store with per-entry TTL.
pub struct RedbKvStore {
    db: Arc<Database>,
    path: String,
    /// Actual file path for temporary databases (for cleanup).
    temp_path: Option<PathBuf>,
}

impl RedbKvStore {
    /// Create a new store with the given configuration.
    pub fn new(config: RedbKvStoreConfig) -> Result<Self> {
        let path = &config.path;

        let (db, temp_path) = if path == ":memory:" {
            // redb doesn't support true in-memory databases; use a temp file.
            let temp_path =
                std::env::temp_dir().join(format!("casalink_{}.redb", uuid::Uuid::new_v4()));
            let db =
                Database::create(&temp_path).map_err(|e| Error::Storage(e.to_string()))?;
            (db, Some(temp_path))
        } else {
            let path_ref = Path::new(path);
            if config.create_dirs {
                if let Some(parent) = path_ref.parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let db = if path_ref.exists() {
                Database::open(path_ref).map_err(|e| Error::Storage(e.to_string()))?
            } else {
                Database::create(path_ref).map_err(|e| Error::Storage(e.to_string()))?
            };
            (db, None)
        };

        Ok(Self {
            db: Arc::new(db),
            path: config.path,
            temp_path,
        })
    }

    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(RedbKvStoreConfig::new(
            path.as_ref().to_string_lossy().to_string(),
        ))
    }

    /// Get the storage path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn read_entry(&self, key: &str) -> Result<Option<Entry>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| Error::Storage(e.to_string()))?;
        let table = match txn.open_table(KV_TABLE) {
            Ok(table) => table,
            // First read before any write: the table does not exist yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        match table.get(key).map_err(|e| Error::Storage(e.to_string()))? {
            Some(raw) => {
                let entry: Entry = bincode::deserialize(raw.value())
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn write_entry(&self, key: &str, entry: &Entry) -> Result<()> {
        let raw = bincode::serialize(entry).map_err(|e| Error::Serialization(e.to_string()))?;
        let txn = self
            .db
            .begin_write()
            .map_err(|e| Error::Storage(e.to_string()))?;
        {
            let mut table = txn
                .open_table(KV_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            table
                .insert(key, raw.as_slice())
                .map_err(|e| Error::Storage(e.to_string()))?;
        }
        txn.commit().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove_keys(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let txn = self
            .db
            .begin_write()
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut removed = 0;
        {
            let mut table = txn
                .open_table(KV_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            for key in keys {
                if table
                    .remove(key.as_str())
                    .map_err(|e| Error::Storage(e.to_string()))?
                    .is_some()
                {
                    removed += 1;
                }
            }
        }
        txn.commit().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(removed)
    }

    /// Collect keys under a prefix, optionally only expired ones.
    fn collect_keys(&self, prefix: &str, expired_only: bool) -> Result<Vec<String>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| Error::Storage(e.to_string()))?;
        let table = match txn.open_table(KV_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        let mut keys = Vec::new();
        for item in table.iter().map_err(|e| Error::Storage(e.to_string()))? {
            let (key, value) = item.map_err(|e| Error::Storage(e.to_string()))?;
            let key_str = key.value();
            if !key_str.starts_with(prefix) {
                continue;
            }
            if expired_only {
                let entry: Entry = match bincode::deserialize(value.value()) {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(key = %key_str, "dropping undecodable entry: {}", e);
                        keys.push(key_str.to_string());
                        continue;
                    }
                };
                if !entry.is_expired() {
                    continue;
                }
            }
            keys.push(key_str.to_string());
        }
        Ok(keys)
    }
}

impl KvStore for RedbKvStore {
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.write_entry(key, &Entry::new(value, ttl))
    }

    fn set_keeping_ttl(
        &self,
        key: &str,
        value: &[u8],
        default_ttl: Option<Duration>,
    ) -> Result<()> {
        let expires_at_ms = match self.read_entry(key)? {
            Some(existing) if !existing.is_expired() => existing.expires_at_ms,
            _ => Entry::new(&[], default_ttl).expires_at_ms,
        };
        self.write_entry(
            key,
            &Entry {
                expires_at_ms,
                payload: value.to_vec(),
            },
        )
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get_with_ttl(key)?.map(|(value, _)| value))
    }

    fn get_with_ttl(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>> {
        match self.read_entry(key)? {
            Some(entry) if entry.is_expired() => {
                // Lazy eviction.
                let _ = self.remove_keys(std::slice::from_ref(&key.to_string()))?;
                Ok(None)
            }
            Some(entry) => {
                let remaining = entry.remaining();
                Ok(Some((entry.payload, remaining)))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.remove_keys(std::slice::from_ref(&key.to_string()))? > 0)
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.collect_keys(prefix, false)?;
        self.remove_keys(&keys)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| Error::Storage(e.to_string()))?;
        let table = match txn.open_table(KV_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        let mut results = Vec::new();
        for item in table.iter().map_err(|e| Error::Storage(e.to_string()))? {
            let (key, value) = item.map_err(|e| Error::Storage(e.to_string()))?;
            let key_str = key.value();
            if !key_str.starts_with(prefix) {
                continue;
            }
            let entry: Entry = bincode::deserialize(value.value())
                .map_err(|e| Error::Serialization(e.to_string()))?;
            if !entry.is_expired() {
                results.push((key_str.to_string(), entry.payload));
            }
        }
        Ok(results)
    }

    fn purge_expired(&self) -> Result<usize> {
        let keys = self.collect_keys("", true)?;
        self.remove_keys(&keys)
    }

    fn is_persistent(&self) -> bool {
        self.path != ":memory:"
    }
}

/// Cleanup temporary database file when the store is dropped.
impl Drop for RedbKvStore {
    fn drop(&mut self) {
        if let Some(temp_path) = &self.temp_path {
            if let Err(e) = std::fs::remove_file(temp_path) {
                tracing::debug!(
                    "failed to remove temporary database file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RedbKvStoreConfig::new("./data/kv.redb").with_create_dirs(false);
        assert_eq!(config.path, "./data/kv.redb");
        assert!(!config.create_dirs);
    }

    #[test]
    fn test_set_get_round_trip() {
        let store = RedbKvStore::new(RedbKvStoreConfig::memory()).unwrap();
        store.set("a", b"hello", None).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.redb");

        {
            let store = RedbKvStore::open(&path).unwrap();
            store.set("a", b"persisted", None).unwrap();
        }

        let store = RedbKvStore::open(&path).unwrap();
        assert!(store.is_persistent());
        assert_eq!(store.get("a").unwrap(), Some(b"persisted".to_vec()));
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let store = RedbKvStore::new(RedbKvStoreConfig::memory()).unwrap();
        store.set("a", b"1", Some(Duration::ZERO)).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        // The lazy eviction removed the row entirely.
        assert_eq!(store.scan_prefix("").unwrap().len(), 0);
    }

    #[test]
    fn test_set_keeping_ttl_preserves_expiry() {
        let store = RedbKvStore::new(RedbKvStoreConfig::memory()).unwrap();
        store.set("a", b"1", Some(Duration::from_secs(10))).unwrap();

        store
            .set_keeping_ttl("a", b"2", Some(Duration::from_secs(600)))
            .unwrap();

        let (value, remaining) = store.get_with_ttl("a").unwrap().unwrap();
        assert_eq!(value, b"2".to_vec());
        assert!(remaining.unwrap() <= Duration::from_secs(10));
    }

    #[test]
    fn test_delete_prefix_and_purge() {
        let store = RedbKvStore::new(RedbKvStoreConfig::memory()).unwrap();
        store.set("state:d1", b"a", None).unwrap();
        store.set("state:d2", b"b", Some(Duration::ZERO)).unwrap();
        store.set("task:t1", b"c", None).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.delete_prefix("state:").unwrap(), 1);
        assert_eq!(store.get("task:t1").unwrap(), Some(b"c".to_vec()));
    }
}
