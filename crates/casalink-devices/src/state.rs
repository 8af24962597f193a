//! Shadow state for stateless devices.
//!
//! IR-paired appliances cannot report their status through the cloud, so
//! the last successfully dispatched command set is shadowed here and
//! overlaid during aggregation. Writes merge onto the stored set: new
//! codes are added, existing codes overwritten, untouched codes preserved.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use casalink_cloud::types::StatusItem;
use casalink_core::error::Result;
use casalink_core::kv::KvStore;
use casalink_core::value::ScalarValue;

const STATE_PREFIX: &str = "device_state:";

/// Last known command set per device, code-ordered.
pub type DeviceState = BTreeMap<String, ScalarValue>;

/// Persisted, merge-on-write shadow state per device id.
#[derive(Clone)]
pub struct ShadowStateCache {
    store: Arc<dyn KvStore>,
}

impl ShadowStateCache {
    /// Create a cache over the given store.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn key(device_id: &str) -> String {
        format!("{}{}", STATE_PREFIX, device_id)
    }

    /// Merge a command set onto the stored state and persist it.
    pub fn save(&self, device_id: &str, commands: &[StatusItem]) -> Result<()> {
        let mut state = self.get(device_id)?.unwrap_or_default();
        for item in commands {
            state.insert(item.code.clone(), item.value.clone());
        }
        let bytes = serde_json::to_vec(&state)?;
        self.store.set(&Self::key(device_id), &bytes, None)
    }

    /// Like `save`, but logs and swallows failures. Command dispatch must
    /// not fail because the shadow write did.
    pub fn save_best_effort(&self, device_id: &str, commands: &[StatusItem]) {
        if let Err(e) = self.save(device_id, commands) {
            warn!(device_id = %device_id, "shadow state write failed: {}", e);
        }
    }

    /// Read the stored state for a device.
    pub fn get(&self, device_id: &str) -> Result<Option<DeviceState>> {
        match self.store.get(&Self::key(device_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stored state rendered as status items, code-ordered.
    pub fn get_as_status(&self, device_id: &str) -> Result<Option<Vec<StatusItem>>> {
        Ok(self.get(device_id)?.map(|state| {
            state
                .into_iter()
                .map(|(code, value)| StatusItem { code, value })
                .collect()
        }))
    }

    /// Delete every stored entry whose device id is outside `valid_ids`.
    /// Returns the removed device ids so callers can drop their other
    /// traces, like lookup documents.
    pub fn cleanup_orphaned(&self, valid_ids: &HashSet<String>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for (key, _) in self.store.scan_prefix(STATE_PREFIX)? {
            let device_id = &key[STATE_PREFIX.len()..];
            if !valid_ids.contains(device_id) {
                if self.store.delete(&key)? {
                    debug!(device_id = %device_id, "removed orphaned shadow state");
                    removed.push(device_id.to_string());
                }
            }
        }
        Ok(removed)
    }
}
