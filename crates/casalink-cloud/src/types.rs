//! Wire types for the device-cloud API.
//!
//! The cloud's JSON is loosely typed: most fields can be absent depending
//! on the product category, and the nested `collections` list is only
//! present for devices that report sub-devices. Absent and empty are
//! distinct and both shapes are preserved.

use serde::{Deserialize, Serialize};

use casalink_core::error::{Error, Result};
use casalink_core::value::ScalarValue;

/// Response envelope wrapping every device-cloud payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded at the business level.
    pub success: bool,
    /// Business failure code, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Failure message, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Payload, present on success. No `default` attribute here: it would
    /// require `T: Default` for deserialization, and serde already reads a
    /// missing `Option` field as `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Server timestamp in millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, mapping business failures to errors.
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(Error::CloudBusiness {
                code: self.code.unwrap_or(-1),
                message: self.msg.unwrap_or_else(|| "unknown cloud failure".to_string()),
            });
        }
        self.result
            .ok_or_else(|| Error::Serialization("successful envelope without result".to_string()))
    }

    /// Check the business flag only, for acknowledge-style calls whose
    /// payload carries no information.
    pub fn ensure_success(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        Err(Error::CloudBusiness {
            code: self.code.unwrap_or(-1),
            message: self
                .msg
                .clone()
                .unwrap_or_else(|| "unknown cloud failure".to_string()),
        })
    }
}

/// One `{code, value}` status or command item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusItem {
    /// Status code, e.g. `switch_1` or `temp`.
    pub code: String,
    /// Dynamically-typed scalar value.
    pub value: ScalarValue,
}

impl StatusItem {
    /// Create a status item.
    pub fn new(code: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

/// A device record as reported by the cloud, before aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    /// Device id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Product category code.
    #[serde(default)]
    pub category: String,
    /// Online flag from the list endpoint; the batch status endpoint is
    /// authoritative when reachable.
    #[serde(default)]
    pub online: bool,
    /// Current status items.
    #[serde(default)]
    pub status: Vec<StatusItem>,
    /// Owning gateway/hub id, set on hub-routed devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    /// Local pairing key shared with the owning hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
    /// Owning user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Product display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Sub-devices reported directly by the cloud. Absent and empty are
    /// different shapes and must stay that way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<RawDevice>>,
    /// Creation time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<i64>,
    /// Last update time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<i64>,
}

/// One entry of the batch status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatusEntry {
    /// Device id.
    pub id: String,
    /// Online flag at the time of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    /// Current status items.
    #[serde(default)]
    pub status: Vec<StatusItem>,
}

/// Token-grant payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResult {
    /// Bearer token for authenticated calls.
    pub access_token: String,
    /// Validity window in seconds.
    pub expire_time: i64,
    /// Refresh token, unused by this client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Cloud-side user id bound to the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
