//! The canonical merged device view.

use serde::{Deserialize, Serialize};

use casalink_cloud::types::{RawDevice, StatusItem};

/// Product category handling.
///
/// Categories are cloud-assigned product codes. Hubs relay IR commands to
/// paired appliances; those appliances cannot report live status and are
/// shadowed locally instead.
pub mod categories {
    /// Universal IR hub.
    pub const HUB: &str = "wnykq";
    /// IR-controlled air conditioner.
    pub const IR_AC: &str = "infrared_ac";

    /// Whether this category relays commands for paired appliances.
    pub fn is_hub(category: &str) -> bool {
        category == HUB
    }

    /// Whether this category is a hub-routed remote appliance.
    pub fn is_remote(category: &str) -> bool {
        category == IR_AC
    }

    /// Whether the cloud cannot report live status for this category.
    pub fn is_stateless(category: &str) -> bool {
        is_remote(category)
    }

    /// Human-readable category name for search documents.
    pub fn friendly_name(category: &str) -> &str {
        match category {
            HUB => "IR hub",
            IR_AC => "air conditioner",
            "switch" | "kg" => "switch",
            "cz" => "socket",
            "dj" => "light",
            other => other,
        }
    }
}

/// A device in the canonical, merged view.
///
/// `remote_id` is set if and only if this entry is the product of pairing
/// a hub with an IR-controlled appliance; the consumed hub never appears
/// as a standalone entry alongside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    /// Device id. For a merged entry this is the hub's id.
    pub id: String,
    /// Display name. For a merged entry this is the remote's name.
    pub name: String,
    /// Primary product category.
    pub category: String,
    /// Online flag.
    pub online: bool,
    /// Current status items.
    pub status: Vec<StatusItem>,
    /// Paired remote appliance id, set only on merged entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Paired remote appliance category, set only on merged entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_category: Option<String>,
    /// Owning gateway id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    /// Local pairing key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
    /// Product display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Sub-devices reported directly by the cloud. Distinct from hub/remote
    /// merging; absent and empty are different shapes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<Device>>,
    /// Creation time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<i64>,
    /// Last update time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<i64>,
}

impl Device {
    /// Whether this entry resulted from a hub+remote merge.
    pub fn is_merged(&self) -> bool {
        self.remote_id.is_some()
    }
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            category: raw.category,
            online: raw.online,
            status: raw.status,
            remote_id: None,
            remote_category: None,
            gateway_id: raw.gateway_id,
            local_key: raw.local_key,
            product_name: raw.product_name,
            collections: raw
                .collections
                .map(|subs| subs.into_iter().map(Device::from).collect()),
            create_time: raw.create_time,
            update_time: raw.update_time,
        }
    }
}

/// One page of the aggregated device list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceListResult {
    /// Number of devices after filtering, before pagination.
    pub total: usize,
    /// The requested page.
    pub devices: Vec<Device>,
}

/// Read-only lookup for room and hub display names.
///
/// Enrichment only: aggregation proceeds unchanged when no directory is
/// wired in or a name is unknown.
pub trait RoomDirectory: Send + Sync {
    /// Display name of the room a device lives in.
    fn room_name(&self, device_id: &str) -> Option<String>;

    /// Display name of a hub.
    fn hub_name(&self, hub_id: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_predicates() {
        assert!(categories::is_hub(categories::HUB));
        assert!(categories::is_remote(categories::IR_AC));
        assert!(categories::is_stateless(categories::IR_AC));
        assert!(!categories::is_hub("switch"));
        assert!(!categories::is_stateless(categories::HUB));
    }

    #[test]
    fn test_from_raw_keeps_collections_shape() {
        let raw: RawDevice = serde_json::from_str(
            r#"{"id": "p1", "name": "Panel", "collections": [{"id": "c1", "name": "Key 1"}]}"#,
        )
        .unwrap();
        let device = Device::from(raw);
        assert!(!device.is_merged());
        let subs = device.collections.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, "c1");

        let bare: RawDevice = serde_json::from_str(r#"{"id": "p2"}"#).unwrap();
        assert!(Device::from(bare).collections.is_none());
    }
}
