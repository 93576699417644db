use std::sync::Arc;

use lora_core::config::BrokerConfig;
use lora_core::message::{DeduplicatedUplinkMessage, DownlinkMessage};
use lora_core::AppEui;
use lora_services::{ApplicationStore, RegistryError, StoreError, StreamRegistry};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Stream(#[from] RegistryError),
    #[error("no handler registered for application {0}")]
    UnknownApplication(AppEui),
    #[error(transparent)]
    Store(StoreError),
}

impl BrokerError {
    /// The stream named in the call was not active.
    pub fn is_not_active(&self) -> bool {
        matches!(self, Self::Stream(RegistryError::NotActive(_)))
    }
}

pub struct Broker {
    routers: StreamRegistry<DownlinkMessage>,
    handlers: StreamRegistry<DeduplicatedUplinkMessage>,
    applications: Arc<dyn ApplicationStore>,
}

impl Broker {
    pub fn new(config: &BrokerConfig, applications: Arc<dyn ApplicationStore>) -> Self {
        Self {
            routers: StreamRegistry::new("router", config.stream_buffer),
            handlers: StreamRegistry::new("handler", config.stream_buffer),
            applications,
        }
    }

    pub fn applications(&self) -> &Arc<dyn ApplicationStore> {
        &self.applications
    }

    // ── Routers ──────────────────────────────────────────────────────────────

    /// Open the downlink stream for a router.
    pub fn activate_router(
        &self,
        router_id: &str,
    ) -> Result<mpsc::Receiver<DownlinkMessage>, BrokerError> {
        Ok(self.routers.activate(router_id)?)
    }

    pub fn deactivate_router(&self, router_id: &str) -> Result<(), BrokerError> {
        Ok(self.routers.deactivate(router_id)?)
    }

    pub fn send_downlink(&self, router_id: &str, message: DownlinkMessage) -> Result<(), BrokerError> {
        Ok(self.routers.send(router_id, message)?)
    }

    // ── Handlers ─────────────────────────────────────────────────────────────

    /// Open the uplink stream for a handler.
    pub fn activate_handler(
        &self,
        handler_id: &str,
    ) -> Result<mpsc::Receiver<DeduplicatedUplinkMessage>, BrokerError> {
        Ok(self.handlers.activate(handler_id)?)
    }

    pub fn deactivate_handler(&self, handler_id: &str) -> Result<(), BrokerError> {
        Ok(self.handlers.deactivate(handler_id)?)
    }

    /// Deliver an uplink to the handler of its application.
    pub fn send_uplink(&self, message: DeduplicatedUplinkMessage) -> Result<(), BrokerError> {
        let app = self.applications.get(message.app_eui).map_err(|e| match e {
            StoreError::NotFound => BrokerError::UnknownApplication(message.app_eui),
            other => BrokerError::Store(other),
        })?;
        tracing::debug!(
            app_eui = %message.app_eui,
            dev_eui = %message.dev_eui,
            handler = %app.handler_id,
            gateways = message.gateway_metadata.len(),
            "uplink to handler"
        );
        Ok(self.handlers.send(&app.handler_id, message)?)
    }
}
