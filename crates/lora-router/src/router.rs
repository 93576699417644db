//! Router — gateway table, broker connections and downlink streams.
//!
//! Activation and uplink forwarding live in their own modules; this one
//! holds the state they share and the downlink path back to gateways.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use lora_core::config::RouterConfig;
use lora_core::message::{DownlinkMessage, GatewayStatus};
use lora_core::{get_band, Band, GatewayEui};
use lora_services::{Announcement, Gateway, PeerDirectory, StreamRegistry};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::client::{BrokerClient, BrokerConnector, DownlinkSender};
use crate::error::RouterError;

/// A cached broker connection and the address it was made to.
struct BrokerConnection {
    address: String,
    client: Arc<dyn BrokerClient>,
}

pub struct Router {
    config: RouterConfig,
    pub(crate) directory: Arc<dyn PeerDirectory>,
    connector: Arc<dyn BrokerConnector>,
    gateways: DashMap<GatewayEui, Arc<Gateway>>,
    /// Broker connections by announcement id.
    brokers: DashMap<String, BrokerConnection>,
    /// Downlink streams by gateway EUI.
    downlinks: StreamRegistry<DownlinkMessage>,
}

impl Router {
    pub fn new(
        config: RouterConfig,
        directory: Arc<dyn PeerDirectory>,
        connector: Arc<dyn BrokerConnector>,
    ) -> Self {
        let downlinks = StreamRegistry::new("gateway", config.downlink_buffer);
        Self {
            config,
            directory,
            connector,
            gateways: DashMap::new(),
            brokers: DashMap::new(),
            downlinks,
        }
    }

    // ── Gateways ─────────────────────────────────────────────────────────────

    /// Gateway state for `eui`, created on first use.
    pub fn get_gateway(&self, eui: GatewayEui) -> Arc<Gateway> {
        self.gateways
            .entry(eui)
            .or_insert_with(|| Arc::new(Gateway::new(eui)))
            .value()
            .clone()
    }

    pub fn handle_gateway_status(&self, eui: GatewayEui, status: GatewayStatus) {
        tracing::debug!(gateway = %eui, region = %status.region, "gateway status");
        self.get_gateway(eui).status.update(status);
    }

    /// Band of the region the gateway last reported.
    pub(crate) fn band_for(&self, gateway: &Gateway) -> Result<&'static Band, RouterError> {
        let status = gateway.status.get()?;
        Ok(get_band(&status.region)?)
    }

    pub(crate) fn deadline(&self) -> Instant {
        Instant::now() + self.config.request_timeout()
    }

    // ── Brokers ──────────────────────────────────────────────────────────────

    fn broker(&self, announcement: &Announcement) -> anyhow::Result<Arc<dyn BrokerClient>> {
        if let Some(cached) = self.brokers.get(&announcement.id) {
            if cached.address == announcement.net_address {
                return Ok(cached.client.clone());
            }
        }
        // a broker announced under a new address drops its old connection
        if let Some((_, stale)) = self
            .brokers
            .remove_if(&announcement.id, |_, c| c.address != announcement.net_address)
        {
            tracing::info!(
                broker = %announcement.id,
                from = %stale.address,
                to = %announcement.net_address,
                "broker moved, reconnecting"
            );
        }

        let client = self.connector.connect(announcement)?;
        tracing::info!(
            broker = %announcement.id,
            address = %announcement.net_address,
            "broker connected"
        );
        self.brokers.insert(
            announcement.id.clone(),
            BrokerConnection {
                address: announcement.net_address.clone(),
                client: client.clone(),
            },
        );
        Ok(client)
    }

    /// Drop connections to brokers missing from `announcements`, the
    /// directory's complete current view.
    pub(crate) fn forget_departed(&self, announcements: &[Announcement]) {
        self.brokers.retain(|id, _| {
            let present = announcements.iter().any(|a| &a.id == id);
            if !present {
                tracing::info!(broker = %id, "broker left the directory");
            }
            present
        });
    }

    /// Connections for `announcements`. Brokers that cannot be reached are
    /// left out.
    pub(crate) fn connect_all(
        &self,
        announcements: &[Announcement],
    ) -> Vec<(String, Arc<dyn BrokerClient>)> {
        announcements
            .iter()
            .filter_map(|a| match self.broker(a) {
                Ok(client) => Some((a.id.clone(), client)),
                Err(e) => {
                    tracing::warn!(broker = %a.id, error = %e, "skipping unreachable broker");
                    None
                }
            })
            .collect()
    }

    // ── Downlinks ────────────────────────────────────────────────────────────

    /// Open the downlink stream of a gateway.
    pub fn subscribe_downlink(
        &self,
        eui: GatewayEui,
    ) -> Result<mpsc::Receiver<DownlinkMessage>, RouterError> {
        Ok(self.downlinks.activate(&eui.to_string())?)
    }

    pub fn unsubscribe_downlink(&self, eui: GatewayEui) -> Result<(), RouterError> {
        Ok(self.downlinks.deactivate(&eui.to_string())?)
    }

    /// Queue `message` on the stream of the gateway its option names.
    pub fn handle_downlink(&self, message: DownlinkMessage) -> Result<(), RouterError> {
        let eui = message
            .downlink_option
            .as_ref()
            .ok_or(RouterError::MissingDownlinkOption)?
            .gateway_eui;
        self.downlinks.send(&eui.to_string(), message)?;
        self.get_gateway(eui).utilization.add_tx();
        Ok(())
    }
}

impl DownlinkSender for Router {
    fn handle_downlink(&self, message: DownlinkMessage) -> BoxFuture<'_, anyhow::Result<()>> {
        let result = Router::handle_downlink(self, message).map_err(anyhow::Error::from);
        Box::pin(future::ready(result))
    }
}
