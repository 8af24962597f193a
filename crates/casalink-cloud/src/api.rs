//! The `DeviceCloud` seam.
//!
//! The aggregator and dispatcher are written against this trait so they
//! can be exercised with an in-process mock; `CloudClient` is the real
//! signed-HTTP implementation.

use async_trait::async_trait;
use serde_json::json;

use casalink_core::error::Result;
use casalink_core::value::ScalarValue;

use crate::types::{DeviceStatusEntry, RawDevice, StatusItem};

/// An infrared command routed through a hub to a paired remote appliance.
#[derive(Debug, Clone, PartialEq)]
pub enum IrCommand {
    /// A single `{code, value}` key press.
    Code {
        /// IR function code.
        code: String,
        /// Function value.
        value: ScalarValue,
    },
    /// A full climate state for air-conditioner remotes; absent fields are
    /// left unchanged by the hub.
    Climate {
        /// Power on/off (1/0).
        power: Option<i64>,
        /// Operating mode.
        mode: Option<i64>,
        /// Target temperature.
        temp: Option<i64>,
        /// Fan speed.
        wind: Option<i64>,
    },
}

impl IrCommand {
    /// JSON body for the IR command endpoint.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            IrCommand::Code { code, value } => json!({ "code": code, "value": value }),
            IrCommand::Climate {
                power,
                mode,
                temp,
                wind,
            } => {
                let mut body = serde_json::Map::new();
                if let Some(power) = power {
                    body.insert("power".to_string(), json!(power));
                }
                if let Some(mode) = mode {
                    body.insert("mode".to_string(), json!(mode));
                }
                if let Some(temp) = temp {
                    body.insert("temp".to_string(), json!(temp));
                }
                if let Some(wind) = wind {
                    body.insert("wind".to_string(), json!(wind));
                }
                serde_json::Value::Object(body)
            }
        }
    }

    /// Whether this goes to the scenes-command variant of the IR path.
    pub fn is_climate(&self) -> bool {
        matches!(self, IrCommand::Climate { .. })
    }
}

/// Outbound device-cloud operations used by the device-control core.
#[async_trait]
pub trait DeviceCloud: Send + Sync {
    /// Fetch the raw device list for a user.
    async fn user_devices(&self, access_token: &str, uid: &str) -> Result<Vec<RawDevice>>;

    /// Fetch batch online/status entries for a set of device ids.
    async fn devices_status(
        &self,
        access_token: &str,
        device_ids: &[String],
    ) -> Result<Vec<DeviceStatusEntry>>;

    /// Fetch one device's detail record.
    async fn device_detail(&self, access_token: &str, device_id: &str) -> Result<RawDevice>;

    /// Send commands over the primary command path.
    async fn send_commands(
        &self,
        access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()>;

    /// Send commands over the legacy command path. Used only for the
    /// dispatcher's single rewrite retry.
    async fn send_commands_legacy(
        &self,
        access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()>;

    /// Send an infrared command to a hub-routed remote.
    async fn send_ir_command(
        &self,
        access_token: &str,
        gateway_id: &str,
        remote_id: &str,
        command: &IrCommand,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_command_body() {
        let command = IrCommand::Code {
            code: "power".to_string(),
            value: ScalarValue::from(1),
        };
        assert_eq!(command.to_body(), json!({"code": "power", "value": 1}));
        assert!(!command.is_climate());
    }

    #[test]
    fn test_climate_body_omits_absent_fields() {
        let command = IrCommand::Climate {
            power: Some(1),
            mode: None,
            temp: Some(24),
            wind: None,
        };
        assert_eq!(command.to_body(), json!({"power": 1, "temp": 24}));
        assert!(command.is_climate());
    }
}
