//! Lookup/search collaborator trait.
//!
//! The aggregator publishes one human-readable document per device so
//! callers can resolve free-form names ("living room AC") to device ids.

use crate::error::Result;

/// A fuzzy full-text lookup store keyed by document id.
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for `id`.
    fn upsert(&self, id: &str, text: &str) -> Result<()>;

    /// Return the ids of documents matching `query`, best match first.
    fn search(&self, query: &str) -> Result<Vec<String>>;

    /// Remove the document for `id`. Returns whether it existed.
    fn remove(&self, id: &str) -> Result<bool>;
}
