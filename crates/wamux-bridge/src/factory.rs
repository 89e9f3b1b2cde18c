// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ClientFactory`] that allocates devices on the bridge.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info};

use wamux_config::BridgeConfig;
use wamux_core::{AdapterType, ClientFactory, HealthStatus, PluginAdapter, ProtocolClient, WamuxError};

use crate::client::{BridgeApi, BridgeClient};
use crate::types::{CreateDeviceRequest, DeviceState};

/// Builds [`BridgeClient`]s backed by devices on one bridge.
pub struct BridgeClientFactory {
    api: BridgeApi,
}

#[derive(Debug, Deserialize)]
struct BridgeHealth {
    #[serde(default)]
    status: Option<String>,
}

impl BridgeClientFactory {
    pub fn new(config: &BridgeConfig) -> Result<Self, WamuxError> {
        Ok(Self {
            api: BridgeApi::new(config)?,
        })
    }

    async fn create_device(
        &self,
        phone: &str,
        jid: Option<&str>,
    ) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        let body = CreateDeviceRequest {
            phone_number: phone,
            jid,
        };
        let state: DeviceState = self.api.call(Method::POST, "/devices", Some(&body)).await?;
        debug!(tenant = %phone, handle = %state.id, bound = state.jid.is_some(), "bridge device ready");
        Ok(Arc::new(BridgeClient::new(self.api.clone(), phone, state)))
    }
}

#[async_trait]
impl PluginAdapter for BridgeClientFactory {
    fn name(&self) -> &str {
        "bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Protocol
    }

    async fn health_check(&self) -> Result<HealthStatus, WamuxError> {
        match self
            .api
            .call::<(), BridgeHealth>(Method::GET, "/health", None)
            .await
        {
            Ok(health) => match health.status.as_deref() {
                None | Some("ok") => Ok(HealthStatus::Healthy),
                Some(other) => Ok(HealthStatus::Degraded(format!("bridge reports {other}"))),
            },
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), WamuxError> {
        info!(base_url = %self.api.base_url(), "bridge client factory shut down");
        Ok(())
    }
}

#[async_trait]
impl ClientFactory for BridgeClientFactory {
    async fn new_device(&self, phone: &str) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        self.create_device(phone, None).await
    }

    async fn from_device(
        &self,
        phone: &str,
        device_id: &str,
    ) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        let client = self.create_device(phone, Some(device_id)).await?;
        if client.device_id().is_none() {
            return Err(WamuxError::NotFound {
                kind: "device",
                id: device_id.to_string(),
            });
        }
        Ok(client)
    }
}
