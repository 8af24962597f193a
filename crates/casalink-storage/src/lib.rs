//! Storage backends for Casalink.
//!
//! Implements the `KvStore` and `SearchIndex` collaborator traits from
//! `casalink-core`:
//! - `RedbKvStore`: persistent TTL-bearing store on the redb embedded database
//! - `MemoryKvStore`: in-process mirror with the same TTL semantics
//! - `MemorySearchIndex`: fuzzy device-name lookup

pub mod backends;
pub mod search;

pub use backends::memory::MemoryKvStore;
pub use backends::redb::{RedbKvStore, RedbKvStoreConfig};
pub use search::MemorySearchIndex;
