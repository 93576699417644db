//! Uplink forwarding: same race as activation, but only brokers whose
//! prefixes cover the frame's DevAddr are asked.

use std::sync::Arc;

use lora_core::message::{BrokerUplinkMessage, BrokerUplinkResponse, UplinkMessage};
use lora_core::{DevAddr, GatewayEui};

use crate::client::BrokerClient;
use crate::downlink::build_downlink_options;
use crate::error::{RequestKind, RouterError};
use crate::race::race;
use crate::router::Router;

impl Router {
    pub async fn handle_uplink(
        &self,
        gateway_eui: GatewayEui,
        mut uplink: UplinkMessage,
    ) -> Result<(), RouterError> {
        let deadline = self.deadline();
        uplink.gateway_metadata.gateway_eui = gateway_eui;

        let gateway = self.get_gateway(gateway_eui);
        gateway.utilization.add_rx();

        let band = self.band_for(&gateway)?;
        let dev_addr = DevAddr::from_mac_payload(&uplink.payload)
            .ok_or(RouterError::InvalidPayload("frame too short for a DevAddr"))?;

        let message = BrokerUplinkMessage {
            downlink_options: build_downlink_options(&uplink, band, gateway_eui, false),
            payload: uplink.payload,
            protocol_metadata: uplink.protocol_metadata,
            gateway_metadata: uplink.gateway_metadata,
        };

        let announcements = self
            .directory
            .discover(dev_addr)
            .await
            .map_err(RouterError::Discovery)?;
        let peers = self.connect_all(&announcements);
        tracing::debug!(
            gateway = %gateway_eui,
            %dev_addr,
            brokers = peers.len(),
            "forwarding uplink"
        );

        let outcome = race(
            RequestKind::Uplink,
            peers,
            |broker: Arc<dyn BrokerClient>| {
                let message = message.clone();
                async move { broker.uplink(message).await }
            },
            deadline,
            self,
            |response: BrokerUplinkResponse| response.downlink,
        )
        .await?;

        tracing::debug!(%dev_addr, broker = %outcome.accepted, "uplink accepted");
        Ok(())
    }
}
