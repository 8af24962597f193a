//! `KvStore` backend implementations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod memory;
pub mod redb;

/// Stored entry envelope shared by the backends.
///
/// The expiry is an absolute UTC instant so that `set_keeping_ttl` can
/// carry it over unchanged: preserving the instant, not the original
/// duration, is what keeps the TTL clock from moving forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry {
    /// Absolute expiry in unix millis; `None` never expires.
    pub expires_at_ms: Option<i64>,
    /// Raw value bytes.
    pub payload: Vec<u8>,
}

impl Entry {
    pub fn new(payload: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            expires_at_ms: ttl.map(|t| now_ms() + t.as_millis() as i64),
            payload: payload.to_vec(),
        }
    }

    /// Whether the entry is past its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at_ms {
            Some(at) => now_ms() >= at,
            None => false,
        }
    }

    /// Remaining lifetime, `None` for entries that never expire.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at_ms
            .map(|at| Duration::from_millis(at.saturating_sub(now_ms()).max(0) as u64))
    }
}

/// Current unix time in milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
