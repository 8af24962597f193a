//! Device aggregation.
//!
//! Reconciles the raw cloud device list into the canonical view: batch
//! online overlay, shadow state for stateless categories, hub+remote
//! pairing, filtering, deterministic pagination and search-index upkeep.
//! Only the raw list fetch is fatal; every other side channel degrades
//! gracefully.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use casalink_cloud::api::DeviceCloud;
use casalink_cloud::types::StatusItem;
use casalink_core::error::Result;
use casalink_core::kv::KvStore;
use casalink_core::search::SearchIndex;

use crate::device::{categories, Device, DeviceListResult, RoomDirectory};
use crate::state::ShadowStateCache;

const CACHE_PREFIX: &str = "device_list:";
const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(120);

/// Builds the canonical device list for a user.
pub struct DeviceAggregator {
    cloud: Arc<dyn DeviceCloud>,
    kv: Arc<dyn KvStore>,
    state: ShadowStateCache,
    index: Arc<dyn SearchIndex>,
    rooms: Option<Arc<dyn RoomDirectory>>,
    result_ttl: Duration,
}

impl DeviceAggregator {
    /// Create an aggregator.
    pub fn new(
        cloud: Arc<dyn DeviceCloud>,
        kv: Arc<dyn KvStore>,
        state: ShadowStateCache,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            cloud,
            kv,
            state,
            index,
            rooms: None,
            result_ttl: DEFAULT_RESULT_TTL,
        }
    }

    /// Wire in the room/hub display-name directory.
    pub fn with_room_directory(mut self, rooms: Arc<dyn RoomDirectory>) -> Self {
        self.rooms = Some(rooms);
        self
    }

    /// Override the result-cache TTL.
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// Aggregate, filter, sort and paginate the device list for `uid`.
    ///
    /// `limit == 0` returns everything; otherwise `page` is 1-based and an
    /// out-of-range page yields an empty list. The result is cached under
    /// a key covering every parameter that affects it.
    pub async fn get_devices(
        &self,
        access_token: &str,
        uid: &str,
        page: usize,
        limit: usize,
        category: &str,
    ) -> Result<DeviceListResult> {
        let cache_key = cache_key(uid, category, page, limit);
        // The cache is an accelerator only; a broken store must not fail
        // the call while the cloud is healthy.
        match self.kv.get(&cache_key) {
            Ok(Some(bytes)) => {
                if let Ok(result) = serde_json::from_slice::<DeviceListResult>(&bytes) {
                    debug!(uid = %uid, "device list served from cache");
                    // A cache hit must not leave the lookup index stale.
                    self.spawn_index_refresh(uid, result.devices.clone());
                    return Ok(result);
                }
                warn!(uid = %uid, "dropping undecodable cached device list");
                let _ = self.kv.delete(&cache_key);
            }
            Ok(None) => {}
            Err(e) => warn!(uid = %uid, "device list cache read failed: {}", e),
        }

        // The raw list is the one fatal dependency of this call.
        let raw = self.cloud.user_devices(access_token, uid).await?;
        let mut devices: Vec<Device> = raw.into_iter().map(Device::from).collect();

        self.overlay_batch_status(access_token, &mut devices).await;
        self.overlay_shadow_state(&mut devices);

        let merged = merge_hub_remotes(devices);

        let valid_ids = collect_valid_ids(&merged);
        match self.state.cleanup_orphaned(&valid_ids) {
            Ok(orphans) => {
                // A pruned device's lookup document goes with it.
                for device_id in orphans {
                    if let Err(e) = self.index.remove(&device_id) {
                        warn!(device_id = %device_id, "lookup document removal failed: {}", e);
                    }
                }
            }
            Err(e) => warn!("orphaned shadow-state cleanup failed: {}", e),
        }

        let mut filtered: Vec<Device> = if category.is_empty() {
            merged
        } else {
            merged
                .into_iter()
                .filter(|d| {
                    d.category == category || d.remote_category.as_deref() == Some(category)
                })
                .collect()
        };

        // Byte-lexicographic name order keeps pagination deterministic.
        filtered.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let total = filtered.len();
        let devices = paginate(filtered, page, limit);
        let result = DeviceListResult { total, devices };

        match serde_json::to_vec(&result) {
            Ok(bytes) => {
                if let Err(e) = self.kv.set(&cache_key, &bytes, Some(self.result_ttl)) {
                    warn!("device list cache write failed: {}", e);
                }
            }
            Err(e) => warn!("device list cache encode failed: {}", e),
        }

        self.spawn_index_refresh(uid, result.devices.clone());
        Ok(result)
    }

    /// Overlay batch online/status entries. Non-fatal: on failure each
    /// device keeps the online flag the list endpoint reported.
    async fn overlay_batch_status(&self, access_token: &str, devices: &mut [Device]) {
        let ids: Vec<String> = devices.iter().map(|d| d.id.clone()).collect();
        let entries = match self.cloud.devices_status(access_token, &ids).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "batch status fetch failed, keeping list-reported online flags: {}",
                    e
                );
                return;
            }
        };

        let by_id: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.id.as_str(), i))
            .collect();
        for device in devices.iter_mut() {
            if let Some(&i) = by_id.get(device.id.as_str()) {
                let entry = &entries[i];
                if let Some(online) = entry.online {
                    device.online = online;
                }
                if !entry.status.is_empty() {
                    device.status = entry.status.clone();
                }
            }
        }
    }

    /// Overlay shadowed state for categories the cloud cannot report,
    /// synthesizing baseline defaults when nothing was ever dispatched.
    fn overlay_shadow_state(&self, devices: &mut [Device]) {
        for device in devices.iter_mut() {
            if !categories::is_stateless(&device.category) {
                continue;
            }
            match self.state.get_as_status(&device.id) {
                Ok(Some(stored)) => overlay_status(&mut device.status, stored),
                Ok(None) => {
                    if device.status.is_empty() {
                        device.status = baseline_status(&device.category);
                    }
                }
                Err(e) => warn!(device_id = %device.id, "shadow state read failed: {}", e),
            }
        }
    }

    /// Upsert the lookup documents off the caller's path.
    fn spawn_index_refresh(&self, uid: &str, devices: Vec<Device>) {
        let index = Arc::clone(&self.index);
        let rooms = self.rooms.clone();
        let uid = uid.to_string();

        tokio::spawn(async move {
            let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
            if let Err(e) = index.upsert(&format!("user:{}", uid), &names.join(" ")) {
                warn!(uid = %uid, "user lookup document upsert failed: {}", e);
            }

            for device in &devices {
                let text = search_document(device, rooms.as_deref());
                if let Err(e) = index.upsert(&device.id, &text) {
                    warn!(device_id = %device.id, "lookup document upsert failed: {}", e);
                }
            }
        });
    }
}

/// Cache key covering every parameter that affects the result. The
/// free-form parts are length-prefixed so a `:` inside `uid` or
/// `category` cannot alias another request's key.
fn cache_key(uid: &str, category: &str, page: usize, limit: usize) -> String {
    format!(
        "{}{}:{}:{}:{}:{}:{}",
        CACHE_PREFIX,
        uid.len(),
        uid,
        category.len(),
        category,
        page,
        limit
    )
}

/// Human-readable search document for one device.
fn search_document(device: &Device, rooms: Option<&dyn RoomDirectory>) -> String {
    let mut parts = vec![device.name.clone()];
    parts.push(categories::friendly_name(&device.category).to_string());
    if let Some(remote_category) = &device.remote_category {
        parts.push(categories::friendly_name(remote_category).to_string());
    }
    if let Some(rooms) = rooms {
        if let Some(room) = rooms.room_name(&device.id) {
            parts.push(room);
        }
        if let Some(hub) = device
            .gateway_id
            .as_deref()
            .or(if device.is_merged() { Some(device.id.as_str()) } else { None })
            .and_then(|id| rooms.hub_name(id))
        {
            parts.push(hub);
        }
    }
    if let Some(product) = &device.product_name {
        parts.push(product.clone());
    }
    parts.push(device.id.clone());
    parts.join(" ")
}

/// Overlay stored status items onto the live list: stored codes overwrite
/// matching live codes, new codes append.
fn overlay_status(status: &mut Vec<StatusItem>, stored: Vec<StatusItem>) {
    for item in stored {
        match status.iter_mut().find(|s| s.code == item.code) {
            Some(existing) => existing.value = item.value,
            None => status.push(item),
        }
    }
}

/// Default status set for a stateless device that was never dispatched to.
fn baseline_status(category: &str) -> Vec<StatusItem> {
    match category {
        categories::IR_AC => vec![
            StatusItem::new("power", false),
            StatusItem::new("mode", 0),
            StatusItem::new("temp", 24),
            StatusItem::new("wind", 0),
        ],
        _ => Vec::new(),
    }
}

/// Pair each remote appliance with its owning hub.
///
/// Resolution order is gateway id first, then local key. A merged entry
/// keeps the hub's identity and network fields and takes the remote's
/// name, status, id and category as the `remote_*` overlay; the consumed
/// hub is excluded from the result. Remotes with no resolvable hub pass
/// through unmerged, as do all other devices.
fn merge_hub_remotes(devices: Vec<Device>) -> Vec<Device> {
    let mut hub_by_id: HashMap<String, usize> = HashMap::new();
    let mut hub_by_key: HashMap<String, usize> = HashMap::new();
    for (i, device) in devices.iter().enumerate() {
        if categories::is_hub(&device.category) {
            hub_by_id.insert(device.id.clone(), i);
            if let Some(key) = &device.local_key {
                hub_by_key.insert(key.clone(), i);
            }
        }
    }

    let mut consumed: HashSet<usize> = HashSet::new();
    let mut merged_at: HashMap<usize, Device> = HashMap::new();
    for (i, device) in devices.iter().enumerate() {
        if !categories::is_remote(&device.category) {
            continue;
        }
        let hub_index = device
            .gateway_id
            .as_ref()
            .and_then(|gateway| hub_by_id.get(gateway))
            .or_else(|| {
                device
                    .local_key
                    .as_ref()
                    .and_then(|key| hub_by_key.get(key))
            })
            .copied();

        if let Some(h) = hub_index {
            let hub = &devices[h];
            let mut merged = hub.clone();
            merged.name = device.name.clone();
            merged.status = device.status.clone();
            merged.remote_id = Some(device.id.clone());
            merged.remote_category = Some(device.category.clone());
            consumed.insert(h);
            merged_at.insert(i, merged);
        }
    }

    let mut out = Vec::with_capacity(devices.len());
    for (i, device) in devices.into_iter().enumerate() {
        if consumed.contains(&i) {
            continue;
        }
        match merged_at.remove(&i) {
            Some(merged) => out.push(merged),
            None => out.push(device),
        }
    }
    out
}

/// Every id the current aggregation considers live: device ids, paired
/// remote ids and nested collection ids.
fn collect_valid_ids(devices: &[Device]) -> HashSet<String> {
    fn walk(device: &Device, ids: &mut HashSet<String>) {
        ids.insert(device.id.clone());
        if let Some(remote_id) = &device.remote_id {
            ids.insert(remote_id.clone());
        }
        if let Some(subs) = &device.collections {
            for sub in subs {
                walk(sub, ids);
            }
        }
    }

    let mut ids = HashSet::new();
    for device in devices {
        walk(device, &mut ids);
    }
    ids
}

/// `limit == 0` returns everything; otherwise 1-based pages with
/// out-of-range pages yielding an empty list.
fn paginate(devices: Vec<Device>, page: usize, limit: usize) -> Vec<Device> {
    if limit == 0 {
        return devices;
    }
    if page == 0 {
        return Vec::new();
    }
    devices
        .into_iter()
        .skip(page.saturating_sub(1).saturating_mul(limit))
        .take(limit)
        .collect()
}
