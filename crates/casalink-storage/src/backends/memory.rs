//! In-memory `KvStore` backend.
//!
//! Mirrors the TTL semantics of the redb backend without persistence.
//! Used by tests and as a cache tier when durability is not needed.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use casalink_core::error::Result;
use casalink_core::kv::KvStore;

use super::Entry;

/// In-memory TTL-bearing key-value store.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|e| !e.is_expired()).count()
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn set_keeping_ttl(
        &self,
        key: &str,
        value: &[u8],
        default_ttl: Option<Duration>,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        let expires_at_ms = match entries.get(key) {
            Some(existing) if !existing.is_expired() => existing.expires_at_ms,
            _ => Entry::new(&[], default_ttl).expires_at_ms,
        };
        entries.insert(
            key.to_string(),
            Entry {
                expires_at_ms,
                payload: value.to_vec(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get_with_ttl(key)?.map(|(value, _)| value))
    }

    fn get_with_ttl(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some((entry.payload.clone(), entry.remaining()))),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read();
        let mut results: Vec<(String, Vec<u8>)> = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
            .map(|(key, entry)| (key.clone(), entry.payload.clone()))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        Ok(before - entries.len())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
