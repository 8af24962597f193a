//! Command dispatch with the protocol-mandated single retry.
//!
//! Per dispatch the states are: signed, sent, then success (terminal),
//! business error (one rewrite retry for the unrecognized-command code,
//! terminal otherwise) or transport failure (terminal). Successful command
//! sets are shadowed so aggregation can report them for stateless devices.

use std::sync::Arc;

use tracing::{debug, info};

use casalink_cloud::api::{DeviceCloud, IrCommand};
use casalink_cloud::types::StatusItem;
use casalink_core::error::{Error, Result};

use crate::state::ShadowStateCache;

/// Business code the cloud reports for a command code it does not
/// recognize. The only error that triggers a retry.
pub const UNSUPPORTED_COMMAND_CODE: i64 = 2008;

/// Separator dropped when rewriting command codes for the legacy endpoint.
const CODE_SEPARATOR: char = '_';

/// Rewrite a command code to its legacy shape, e.g. `switch_1 -> switch1`.
/// Codes without the separator come back unchanged.
pub fn rewrite_code(code: &str) -> String {
    code.replace(CODE_SEPARATOR, "")
}

fn rewrite_commands(commands: &[StatusItem]) -> Vec<StatusItem> {
    commands
        .iter()
        .map(|item| StatusItem {
            code: rewrite_code(&item.code),
            value: item.value.clone(),
        })
        .collect()
}

/// Sends switch and IR commands to the device-cloud.
pub struct CommandDispatcher {
    cloud: Arc<dyn DeviceCloud>,
    state: ShadowStateCache,
}

impl CommandDispatcher {
    /// Create a dispatcher.
    pub fn new(cloud: Arc<dyn DeviceCloud>, state: ShadowStateCache) -> Self {
        Self { cloud, state }
    }

    /// Send a switch-style command set to a directly addressable device.
    ///
    /// On the unrecognized-command business error the command codes are
    /// rewritten and resent exactly once to the legacy endpoint with a
    /// fresh signature; every other failure is terminal. Any success
    /// shadows the sent command set, best-effort.
    pub async fn send_switch_command(
        &self,
        access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()> {
        match self.cloud.send_commands(access_token, device_id, commands).await {
            Ok(()) => {
                self.state.save_best_effort(device_id, commands);
                Ok(())
            }
            Err(e) if e.business_code() == Some(UNSUPPORTED_COMMAND_CODE) => {
                let rewritten = rewrite_commands(commands);
                info!(
                    device_id = %device_id,
                    "command codes not recognized, retrying once against legacy endpoint"
                );
                self.cloud
                    .send_commands_legacy(access_token, device_id, &rewritten)
                    .await?;
                self.state.save_best_effort(device_id, &rewritten);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Send an IR command to a hub-routed remote appliance.
    ///
    /// The remote's own detail record is fetched first to resolve the
    /// authoritative hub id; the caller-supplied hint is only used when
    /// the cloud does not report a gateway for the remote.
    pub async fn send_ir_ac_command(
        &self,
        access_token: &str,
        hub_id_hint: Option<&str>,
        remote_id: &str,
        command: &IrCommand,
    ) -> Result<()> {
        let detail = self.cloud.device_detail(access_token, remote_id).await?;
        let resolved = detail
            .gateway_id
            .filter(|id| !id.is_empty())
            .or_else(|| hub_id_hint.map(str::to_string))
            .ok_or_else(|| {
                Error::NotFound(format!("no gateway known for remote {}", remote_id))
            })?;

        debug!(remote_id = %remote_id, gateway_id = %resolved, "dispatching IR command");
        self.cloud
            .send_ir_command(access_token, &resolved, remote_id, command)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockCloud;
    use casalink_core::value::ScalarValue;
    use casalink_storage::MemoryKvStore;

    fn dispatcher(cloud: Arc<MockCloud>) -> CommandDispatcher {
        let state = ShadowStateCache::new(Arc::new(MemoryKvStore::new()));
        CommandDispatcher::new(cloud, state)
    }

    fn dispatcher_with_state(cloud: Arc<MockCloud>) -> (CommandDispatcher, ShadowStateCache) {
        let state = ShadowStateCache::new(Arc::new(MemoryKvStore::new()));
        (CommandDispatcher::new(cloud, state.clone()), state)
    }

    #[test]
    fn test_rewrite_code() {
        assert_eq!(rewrite_code("switch_1"), "switch1");
        assert_eq!(rewrite_code("switch1"), "switch1");
        assert_eq!(rewrite_code("switch_led_1"), "switchled1");
    }

    #[tokio::test]
    async fn test_success_persists_shadow_state() {
        let cloud = Arc::new(MockCloud::default());
        let (dispatcher, state) = dispatcher_with_state(cloud.clone());

        dispatcher
            .send_switch_command("tok", "d1", &[StatusItem::new("switch_1", true)])
            .await
            .unwrap();

        assert_eq!(cloud.sent_primary.lock().unwrap().len(), 1);
        assert!(cloud.sent_legacy.lock().unwrap().is_empty());
        let shadow = state.get("d1").unwrap().unwrap();
        assert_eq!(shadow.get("switch_1"), Some(&ScalarValue::from(true)));
    }

    #[tokio::test]
    async fn test_unrecognized_code_retries_exactly_once_with_rewrite() {
        let cloud = Arc::new(MockCloud::default());
        cloud.fail_primary_with_business(UNSUPPORTED_COMMAND_CODE);
        let (dispatcher, state) = dispatcher_with_state(cloud.clone());

        dispatcher
            .send_switch_command("tok", "d1", &[StatusItem::new("switch_1", true)])
            .await
            .unwrap();

        assert_eq!(cloud.sent_primary.lock().unwrap().len(), 1);
        let legacy = cloud.sent_legacy.lock().unwrap();
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0].1[0].code, "switch1");

        // The shadow records the rewritten set that actually succeeded.
        let shadow = state.get("d1").unwrap().unwrap();
        assert_eq!(shadow.get("switch1"), Some(&ScalarValue::from(true)));
        assert!(shadow.get("switch_1").is_none());
    }

    #[tokio::test]
    async fn test_no_op_rewrite_still_goes_to_legacy_endpoint() {
        let cloud = Arc::new(MockCloud::default());
        cloud.fail_primary_with_business(UNSUPPORTED_COMMAND_CODE);
        let dispatcher = dispatcher(cloud.clone());

        dispatcher
            .send_switch_command("tok", "d1", &[StatusItem::new("switch1", true)])
            .await
            .unwrap();

        let legacy = cloud.sent_legacy.lock().unwrap();
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0].1[0].code, "switch1");
    }

    #[tokio::test]
    async fn test_other_business_error_is_terminal() {
        let cloud = Arc::new(MockCloud::default());
        cloud.fail_primary_with_business(1106);
        let (dispatcher, state) = dispatcher_with_state(cloud.clone());

        let err = dispatcher
            .send_switch_command("tok", "d1", &[StatusItem::new("switch_1", true)])
            .await
            .unwrap_err();

        assert_eq!(err.business_code(), Some(1106));
        assert!(cloud.sent_legacy.lock().unwrap().is_empty());
        assert!(state.get("d1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_terminal() {
        let cloud = Arc::new(MockCloud::default());
        cloud.fail_primary_with_transport();
        let dispatcher = dispatcher(cloud.clone());

        let err = dispatcher
            .send_switch_command("tok", "d1", &[StatusItem::new("switch_1", true)])
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert!(cloud.sent_legacy.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_retry_leaves_no_shadow_state() {
        let cloud = Arc::new(MockCloud::default());
        cloud.fail_primary_with_business(UNSUPPORTED_COMMAND_CODE);
        cloud.fail_legacy_with_business(1106);
        let (dispatcher, state) = dispatcher_with_state(cloud.clone());

        let err = dispatcher
            .send_switch_command("tok", "d1", &[StatusItem::new("switch_1", true)])
            .await
            .unwrap_err();

        assert_eq!(err.business_code(), Some(1106));
        // One retry, no second attempt after the legacy failure.
        assert_eq!(cloud.sent_primary.lock().unwrap().len(), 1);
        assert_eq!(cloud.sent_legacy.lock().unwrap().len(), 1);
        assert!(state.get("d1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ir_command_resolves_gateway_from_detail() {
        let cloud = Arc::new(MockCloud::default());
        cloud.add_detail("r1", Some("h-real"));
        let dispatcher = dispatcher(cloud.clone());

        dispatcher
            .send_ir_ac_command(
                "tok",
                Some("h-stale"),
                "r1",
                &IrCommand::Code {
                    code: "power".to_string(),
                    value: ScalarValue::from(1),
                },
            )
            .await
            .unwrap();

        let sent = cloud.sent_ir.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "h-real");
        assert_eq!(sent[0].1, "r1");
    }

    #[tokio::test]
    async fn test_ir_command_falls_back_to_hint() {
        let cloud = Arc::new(MockCloud::default());
        cloud.add_detail("r1", None);
        let dispatcher = dispatcher(cloud.clone());

        dispatcher
            .send_ir_ac_command(
                "tok",
                Some("h-hint"),
                "r1",
                &IrCommand::Climate {
                    power: Some(1),
                    mode: None,
                    temp: Some(24),
                    wind: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(cloud.sent_ir.lock().unwrap()[0].0, "h-hint");
    }

    #[tokio::test]
    async fn test_ir_command_without_gateway_is_not_found() {
        let cloud = Arc::new(MockCloud::default());
        cloud.add_detail("r1", None);
        let dispatcher = dispatcher(cloud.clone());

        let err = dispatcher
            .send_ir_ac_command(
                "tok",
                None,
                "r1",
                &IrCommand::Code {
                    code: "power".to_string(),
                    value: ScalarValue::from(1),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(cloud.sent_ir.lock().unwrap().is_empty());
    }
}
