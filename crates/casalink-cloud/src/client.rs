//! Signed reqwest transport.
//!
//! Each attempt gets its own millisecond timestamp and signature, computed
//! over the exact bytes that go on the wire. Timeouts are bounded per call
//! so a slow cloud cannot stall the dispatcher: the short auth timeout for
//! token grants, the longer API timeout for everything else.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use casalink_core::config::CloudConfig;
use casalink_core::error::{Error, Result};

use crate::api::{DeviceCloud, IrCommand};
use crate::sign;
use crate::token::TokenCache;
use crate::types::{ApiEnvelope, DeviceStatusEntry, RawDevice, StatusItem, TokenResult};

const API_VERSION: &str = "v1.0";

/// Reqwest-backed implementation of the device-cloud protocol.
pub struct CloudClient {
    http: reqwest::Client,
    config: CloudConfig,
    tokens: TokenCache,
}

impl CloudClient {
    /// Create a client. Fails fast on an invalid configuration.
    pub fn new(config: CloudConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            tokens: TokenCache::new(),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Return a valid access token, granting a fresh one when the cached
    /// token is absent or stale.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get().await {
            return Ok(token);
        }

        let path = format!("/{}/token?grant_type=1", API_VERSION);
        let envelope: ApiEnvelope<TokenResult> = self
            .execute(Method::GET, &path, None, None, self.config.auth_timeout)
            .await?;
        let grant = envelope.into_result()?;

        self.tokens.store(&grant.access_token, grant.expire_time).await;
        debug!(expire_secs = grant.expire_time, "granted fresh access token");
        Ok(grant.access_token)
    }

    /// Drop the cached token, forcing a re-grant on the next call.
    pub async fn invalidate_token(&self) {
        self.tokens.invalidate().await;
    }

    async fn get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<ApiEnvelope<T>> {
        self.execute(
            Method::GET,
            path,
            None,
            Some(access_token),
            self.config.api_timeout,
        )
        .await
    }

    async fn post_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        access_token: &str,
    ) -> Result<ApiEnvelope<T>> {
        let bytes = serde_json::to_vec(body)?;
        self.execute(
            Method::POST,
            path,
            Some(bytes),
            Some(access_token),
            self.config.api_timeout,
        )
        .await
    }

    /// Sign and run one request. The signature covers the final body bytes
    /// and the path including its query string; it is never reused across
    /// attempts.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        access_token: Option<&str>,
        timeout: Duration,
    ) -> Result<ApiEnvelope<T>> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let hash = sign::content_hash(body.as_deref().unwrap_or(b""));
        let string_to_sign = sign::string_to_sign(method.as_str(), &hash, "", path);
        let signature = sign::signature(
            &self.config.client_id,
            &self.config.client_secret,
            access_token,
            timestamp,
            &string_to_sign,
        );

        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .timeout(timeout)
            .header("client_id", &self.config.client_id)
            .header("sign", signature)
            .header("t", timestamp.to_string())
            .header("sign_method", "HMAC-SHA256");
        if let Some(token) = access_token {
            request = request.header("access_token", token);
        }
        if let Some(bytes) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(bytes);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {} from {}", status, path)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[async_trait]
impl DeviceCloud for CloudClient {
    async fn user_devices(&self, access_token: &str, uid: &str) -> Result<Vec<RawDevice>> {
        let path = format!("/{}/users/{}/devices", API_VERSION, uid);
        self.get_signed(&path, access_token).await?.into_result()
    }

    async fn devices_status(
        &self,
        access_token: &str,
        device_ids: &[String],
    ) -> Result<Vec<DeviceStatusEntry>> {
        if device_ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!(
            "/{}/iot-03/devices/status?device_ids={}",
            API_VERSION,
            device_ids.join(",")
        );
        self.get_signed(&path, access_token).await?.into_result()
    }

    async fn device_detail(&self, access_token: &str, device_id: &str) -> Result<RawDevice> {
        let path = format!("/{}/devices/{}", API_VERSION, device_id);
        self.get_signed(&path, access_token).await?.into_result()
    }

    async fn send_commands(
        &self,
        access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()> {
        let path = format!("/{}/iot-03/devices/{}/commands", API_VERSION, device_id);
        let body = json!({ "commands": commands });
        let envelope: ApiEnvelope<serde_json::Value> =
            self.post_signed(&path, &body, access_token).await?;
        envelope.ensure_success()
    }

    async fn send_commands_legacy(
        &self,
        access_token: &str,
        device_id: &str,
        commands: &[StatusItem],
    ) -> Result<()> {
        let path = format!("/{}/devices/{}/commands", API_VERSION, device_id);
        let body = json!({ "commands": commands });
        let envelope: ApiEnvelope<serde_json::Value> =
            self.post_signed(&path, &body, access_token).await?;
        envelope.ensure_success()
    }

    async fn send_ir_command(
        &self,
        access_token: &str,
        gateway_id: &str,
        remote_id: &str,
        command: &IrCommand,
    ) -> Result<()> {
        let suffix = if command.is_climate() {
            "scenes/command"
        } else {
            "command"
        };
        let path = format!(
            "/{}/infrareds/{}/air-conditioners/{}/{}",
            API_VERSION, gateway_id, remote_id, suffix
        );
        let envelope: ApiEnvelope<serde_json::Value> = self
            .post_signed(&path, &command.to_body(), access_token)
            .await?;
        envelope.ensure_success()
    }
}
