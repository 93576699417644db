//! Device activation: forward a join request to every broker, deliver the
//! first join-accept.

use std::sync::Arc;

use lora_core::message::{
    ActivationMetadata, BrokerActivationRequest, BrokerActivationResponse,
    DeviceActivationAccepted, DeviceActivationRequest,
};
use lora_core::{Band, GatewayEui};

use crate::client::BrokerClient;
use crate::downlink::build_downlink_options;
use crate::error::{RequestKind, RouterError};
use crate::race::race;
use crate::router::Router;

/// LoRaWAN join parameters for `band`. Only EU_863_870 carries a CFList.
pub(crate) fn activation_metadata(request: &DeviceActivationRequest, band: &Band) -> ActivationMetadata {
    ActivationMetadata {
        app_eui: request.app_eui,
        dev_eui: request.dev_eui,
        rx1_dr_offset: 0,
        rx2_dr: u32::from(band.rx2_data_rate),
        rx_delay: u32::try_from(band.receive_delay1.as_secs()).unwrap_or(u32::MAX),
        cf_list: band.cf_list.map(<[u64]>::to_vec),
    }
}

impl Router {
    /// Forward an activation request to all brokers. Succeeds once one
    /// broker's join-accept has been queued for the gateway.
    pub async fn handle_activation(
        &self,
        gateway_eui: GatewayEui,
        mut activation: DeviceActivationRequest,
    ) -> Result<DeviceActivationAccepted, RouterError> {
        let deadline = self.deadline();
        activation.gateway_metadata.gateway_eui = gateway_eui;

        let gateway = self.get_gateway(gateway_eui);
        gateway.utilization.add_rx();

        let band = self.band_for(&gateway)?;
        let uplink = activation.as_uplink();
        let request = BrokerActivationRequest {
            downlink_options: build_downlink_options(&uplink, band, gateway_eui, true),
            activation_metadata: activation_metadata(&activation, band),
            payload: activation.payload,
            app_eui: activation.app_eui,
            dev_eui: activation.dev_eui,
            protocol_metadata: activation.protocol_metadata,
            gateway_metadata: activation.gateway_metadata,
        };

        let announcements = self.directory.all().await.map_err(RouterError::Discovery)?;
        self.forget_departed(&announcements);
        let peers = self.connect_all(&announcements);
        tracing::debug!(
            gateway = %gateway_eui,
            app_eui = %request.app_eui,
            dev_eui = %request.dev_eui,
            brokers = peers.len(),
            "forwarding activation"
        );

        let outcome = race(
            RequestKind::Activation,
            peers,
            |broker: Arc<dyn BrokerClient>| {
                let request = request.clone();
                async move { broker.activate(request).await }
            },
            deadline,
            self,
            |response: BrokerActivationResponse| Some(response.into_downlink()),
        )
        .await?;

        tracing::info!(
            gateway = %gateway_eui,
            dev_eui = %request.dev_eui,
            broker = %outcome.accepted,
            "activation accepted"
        );
        Ok(DeviceActivationAccepted)
    }
}
