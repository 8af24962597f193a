//! In-process `DeviceCloud` mock for aggregator and dispatcher tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use casalink_cloud::api::{DeviceCloud, IrCommand};
use casalink_cloud::types::{DeviceStatusEntry, RawDevice, StatusItem};
use casalink_core::error::{Error, Result};

/// Scriptable fake cloud that records every outbound call.
#[derive(Default)]
pub struct MockCloud {
    pub devices: Mutex<Vec<RawDevice>>,
    pub status_entries: Mutex<Vec<DeviceStatusEntry>>,
    pub details: Mutex<HashMap<String, RawDevice>>,

    list_fails: AtomicBool,
    status_fails: AtomicBool,
    primary_business: Mutex<Option<i64>>,
    primary_transport: AtomicBool,
    legacy_business: Mutex<Option<i64>>,

    pub list_calls: AtomicUsize,
    pub sent_primary: Mutex<Vec<(String, Vec<StatusItem>)>>,
    pub sent_legacy: Mutex<Vec<(String, Vec<StatusItem>)>>,
    pub sent_ir: Mutex<Vec<(String, String, IrCommand)>>,
}

impl MockCloud {
    pub fn set_devices(&self, devices: Vec<RawDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn set_status(&self, entries: Vec<DeviceStatusEntry>) {
        *self.status_entries.lock().unwrap() = entries;
    }

    pub fn add_detail(&self, device_id: &str, gateway_id: Option<&str>) {
        self.details.lock().unwrap().insert(
            device_id.to_string(),
            RawDevice {
                id: device_id.to_string(),
                gateway_id: gateway_id.map(str::to_string),
                ..RawDevice::default()
            },
        );
    }

    pub fn fail_list(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_status(&self) {
        self.status_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_primary_with_business(&self, code: i64) {
        *self.primary_business.lock().unwrap() = Some(code);
    }

    pub fn fail_primary_with_transport(&self) {
        self.primary_transport.store(true, Ordering::SeqCst);
    }

    pub fn fail_legacy_with_business(&self, code: i64) {
        *self.legacy_business.lock().unwrap() = Some(code);
    }
}

fn business(code: i64) -> Error {
    Error::CloudBusiness {
        code,
        message: format!("mock business failure {}", code),
    }
}

#[async_trait]
impl DeviceCloud for MockCloud {
    async fn user_devices(&self, _access_token: &str, _uid: &str) -> Result<Vec<RawDevice>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(business(1010));
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn devices_status(
        &self,
        _access_token: &str,
        _device_ids: &[String],
    ) -> Result<Vec<DeviceStatusEntry>> {
        if self.status_fails.load(Ordering::SeqCst) {
            return Err(Error::Transport("mock status outage".to_string()));
        }
        Ok(self.status_entries.lock().unwrap().clone())
    }

    async fn device_detail(&self, _access_token: &str, device_id: &str) -> Result<RawDevice> {
        self.details
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("device {}", device_id)))
    }

    async fn send_commands(
        &self,
        _access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()> {
        self.sent_primary
            .lock()
            .unwrap()
            .push((device_id.to_string(), commands.to_vec()));
        if self.primary_transport.load(Ordering::SeqCst) {
            return Err(Error::Transport("mock network failure".to_string()));
        }
        if let Some(code) = *self.primary_business.lock().unwrap() {
            return Err(business(code));
        }
        Ok(())
    }

    async fn send_commands_legacy(
        &self,
        _access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()> {
        self.sent_legacy
            .lock()
            .unwrap()
            .push((device_id.to_string(), commands.to_vec()));
        if let Some(code) = *self.legacy_business.lock().unwrap() {
            return Err(business(code));
        }
        Ok(())
    }

    async fn send_ir_command(
        &self,
        _access_token: &str,
        gateway_id: &str,
        remote_id: &str,
        command: &IrCommand,
    ) -> Result<()> {
        self.sent_ir.lock().unwrap().push((
            gateway_id.to_string(),
            remote_id.to_string(),
            command.clone(),
        ));
        Ok(())
    }
}

/// Raw device builders for aggregation scenarios.
pub fn raw_device(id: &str, name: &str, category: &str) -> RawDevice {
    RawDevice {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        online: true,
        ..RawDevice::default()
    }
}

pub fn hub(id: &str, name: &str, local_key: Option<&str>) -> RawDevice {
    RawDevice {
        local_key: local_key.map(str::to_string),
        ..raw_device(id, name, crate::device::categories::HUB)
    }
}

pub fn remote(
    id: &str,
    name: &str,
    gateway_id: Option<&str>,
    local_key: Option<&str>,
) -> RawDevice {
    RawDevice {
        gateway_id: gateway_id.map(str::to_string),
        local_key: local_key.map(str::to_string),
        ..raw_device(id, name, crate::device::categories::IR_AC)
    }
}
