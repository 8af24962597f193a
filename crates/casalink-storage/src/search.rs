//! In-memory fuzzy lookup index.
//!
//! Documents are short human-readable device descriptions. A query matches
//! when every whitespace token appears as a case-insensitive substring;
//! shorter documents rank first so the tightest match wins.

use dashmap::DashMap;

use casalink_core::error::Result;
use casalink_core::search::SearchIndex;

/// Concurrent substring-match search index.
#[derive(Default)]
pub struct MemorySearchIndex {
    /// id -> lowercased document text
    documents: DashMap<String, String>,
}

impl MemorySearchIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn upsert(&self, id: &str, text: &str) -> Result<()> {
        self.documents
            .insert(id.to_string(), text.to_lowercase());
        Ok(())
    }

    fn search(&self, query: &str) -> Result<Vec<String>> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(usize, String)> = self
            .documents
            .iter()
            .filter(|doc| tokens.iter().all(|t| doc.value().contains(t)))
            .map(|doc| (doc.value().len(), doc.key().clone()))
            .collect();

        hits.sort();
        Ok(hits.into_iter().map(|(_, id)| id).collect())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.documents.remove(id).is_some())
    }
}
