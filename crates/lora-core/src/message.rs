//! Protocol messages exchanged between gateways, routers, brokers and handlers.
//!
//! Only the LoRaWAN protocol is modelled. Wire encoding is out of scope;
//! these are the in-process shapes the router and broker operate on.

use bytes::Bytes;

use crate::types::{AppEui, DevEui, GatewayEui};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Modulation {
    #[default]
    Lora,
    Fsk,
}

/// LoRaWAN metadata of a received frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RxMetadata {
    pub modulation: Modulation,
    /// e.g. "SF7BW125"
    pub data_rate: String,
    /// e.g. "4/5"
    pub coding_rate: String,
}

/// Radio metadata as seen by the receiving gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayRxMetadata {
    /// Stamped by the router; gateways may leave it empty.
    pub gateway_eui: GatewayEui,
    /// Gateway concentrator timestamp in microseconds.
    pub timestamp: u32,
    pub frequency: u64,
    pub rssi: f32,
    pub snr: f32,
}

/// An uplink as received from a gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UplinkMessage {
    pub payload: Bytes,
    pub protocol_metadata: RxMetadata,
    pub gateway_metadata: GatewayRxMetadata,
}

/// A join request as received from a gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceActivationRequest {
    pub payload: Bytes,
    pub app_eui: AppEui,
    pub dev_eui: DevEui,
    pub protocol_metadata: RxMetadata,
    pub gateway_metadata: GatewayRxMetadata,
}

impl DeviceActivationRequest {
    /// The same frame viewed as a plain uplink, for utilization and
    /// downlink option purposes.
    pub fn as_uplink(&self) -> UplinkMessage {
        UplinkMessage {
            payload: self.payload.clone(),
            protocol_metadata: self.protocol_metadata.clone(),
            gateway_metadata: self.gateway_metadata.clone(),
        }
    }
}

/// Returned to the gateway once some broker accepted the activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceActivationAccepted;

/// One way the device can be reached through a specific gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownlinkOption {
    pub identifier: String,
    pub gateway_eui: GatewayEui,
    pub timestamp: u32,
    pub frequency: u64,
    pub data_rate: String,
    pub coding_rate: String,
    pub power: i32,
    /// Lower is better.
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownlinkMessage {
    pub payload: Bytes,
    pub downlink_option: Option<DownlinkOption>,
}

/// LoRaWAN parameters the network server needs to build a join-accept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationMetadata {
    pub app_eui: AppEui,
    pub dev_eui: DevEui,
    pub rx1_dr_offset: u32,
    pub rx2_dr: u32,
    /// RX1 delay in seconds.
    pub rx_delay: u32,
    pub cf_list: Option<Vec<u64>>,
}

/// Activation request as forwarded by a router to a broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerActivationRequest {
    pub payload: Bytes,
    pub app_eui: AppEui,
    pub dev_eui: DevEui,
    pub protocol_metadata: RxMetadata,
    pub gateway_metadata: GatewayRxMetadata,
    pub activation_metadata: ActivationMetadata,
    pub downlink_options: Vec<DownlinkOption>,
}

/// A broker's acceptance of an activation: the join-accept to send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerActivationResponse {
    pub payload: Bytes,
    pub downlink_option: Option<DownlinkOption>,
}

impl BrokerActivationResponse {
    pub fn into_downlink(self) -> DownlinkMessage {
        DownlinkMessage {
            payload: self.payload,
            downlink_option: self.downlink_option,
        }
    }
}

/// Uplink as forwarded by a router to a broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerUplinkMessage {
    pub payload: Bytes,
    pub protocol_metadata: RxMetadata,
    pub gateway_metadata: GatewayRxMetadata,
    pub downlink_options: Vec<DownlinkOption>,
}

/// A broker's acceptance of an uplink, with a downlink if one is pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerUplinkResponse {
    pub downlink: Option<DownlinkMessage>,
}

/// Broker output towards a handler: one uplink, every gateway that heard it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeduplicatedUplinkMessage {
    pub app_eui: AppEui,
    pub dev_eui: DevEui,
    pub payload: Bytes,
    pub protocol_metadata: RxMetadata,
    pub gateway_metadata: Vec<GatewayRxMetadata>,
}

/// Latest status report of a gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayStatus {
    /// Region name as used by the band table, e.g. "EU_863_870".
    pub region: String,
    pub description: String,
    pub platform: String,
    /// Gateway-local time of the report, Unix nanoseconds.
    pub time: i64,
    pub rx_in: u32,
    pub rx_ok: u32,
    pub tx_in: u32,
    pub tx_ok: u32,
}
