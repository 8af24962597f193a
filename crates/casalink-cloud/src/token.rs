//! Access-token cache.
//!
//! One explicit lock-guarded token with its expiry, constructed once and
//! shared by reference. Refresh happens slightly ahead of the deadline so
//! an in-flight call never carries a token that expires mid-request.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// Margin subtracted from the cloud-reported validity window.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Lock-guarded access-token cache with expiry.
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token if it is still comfortably valid.
    pub async fn get(&self) -> Option<String> {
        let guard = self.inner.read().await;
        guard
            .as_ref()
            .filter(|cached| cached.expires_at > Utc::now())
            .map(|cached| cached.token.clone())
    }

    /// Store a freshly granted token with its validity window in seconds.
    pub async fn store(&self, token: impl Into<String>, expire_secs: i64) {
        let expires_at =
            Utc::now() + Duration::seconds((expire_secs - REFRESH_MARGIN_SECS).max(0));
        *self.inner.write().await = Some(CachedToken {
            token: token.into(),
            expires_at,
        });
    }

    /// Drop the cached token, forcing the next call to re-grant.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}
