//! Key-value collaborator trait.
//!
//! The shadow state cache, the aggregation result cache and the task
//! tracker's persistent tier all go through this interface. Implementations
//! live in `casalink-storage`.

use std::time::Duration;

use crate::error::Result;

/// A persisted key-value store with per-entry TTL.
///
/// A `ttl` of `None` means the entry never expires. Expired entries are
/// treated as absent by every read operation.
pub trait KvStore: Send + Sync {
    /// Write a value, replacing any existing entry and its TTL.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Write a value while preserving the remaining TTL of an existing
    /// entry. If the key is absent, `default_ttl` applies instead. The
    /// expiry instant of a live entry must never move forward.
    fn set_keeping_ttl(&self, key: &str, value: &[u8], default_ttl: Option<Duration>)
        -> Result<()>;

    /// Read a value by key.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Read a value together with its remaining TTL. The TTL is `None`
    /// for entries that never expire.
    fn get_with_ttl(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>>;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every key with the given prefix. Returns the number removed.
    fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    /// List live `(key, value)` pairs under a prefix.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Remove expired entries eagerly. Returns the number evicted.
    /// Reads already treat expired entries as absent; this is a sweep
    /// for long-lived stores.
    fn purge_expired(&self) -> Result<usize>;

    /// Whether data survives process restart.
    fn is_persistent(&self) -> bool;
}
