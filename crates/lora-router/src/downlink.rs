//! Downlink options offered to brokers with every forwarded frame.

use std::time::Duration;

use lora_core::message::{DownlinkOption, UplinkMessage};
use lora_core::{Band, GatewayEui};

/// RX1 is preferred over RX2; lower scores win.
const RX1_SCORE: u32 = 10;
const RX2_SCORE: u32 = 20;

fn delay_micros(delay: Duration) -> u32 {
    u32::try_from(delay.as_micros()).unwrap_or(u32::MAX)
}

/// RX1 and RX2 options for reaching the sender of `uplink` through
/// `gateway_eui`. Activations use the join-accept delays.
pub fn build_downlink_options(
    uplink: &UplinkMessage,
    band: &Band,
    gateway_eui: GatewayEui,
    activation: bool,
) -> Vec<DownlinkOption> {
    let (delay1, delay2) = if activation {
        (band.join_accept_delay1, band.join_accept_delay2)
    } else {
        (band.receive_delay1, band.receive_delay2)
    };
    let rx = &uplink.gateway_metadata;
    let lorawan = &uplink.protocol_metadata;

    let rx1_timestamp = rx.timestamp.wrapping_add(delay_micros(delay1));
    let rx2_timestamp = rx.timestamp.wrapping_add(delay_micros(delay2));

    vec![
        DownlinkOption {
            identifier: format!("{gateway_eui}:{rx1_timestamp}:rx1"),
            gateway_eui,
            timestamp: rx1_timestamp,
            frequency: band.rx1_frequency(rx.frequency),
            data_rate: band.rx1_data_rate(&lorawan.data_rate),
            coding_rate: lorawan.coding_rate.clone(),
            power: band.default_tx_power,
            score: RX1_SCORE,
        },
        DownlinkOption {
            identifier: format!("{gateway_eui}:{rx2_timestamp}:rx2"),
            gateway_eui,
            timestamp: rx2_timestamp,
            frequency: band.rx2_frequency,
            data_rate: band.rx2_data_rate_name.to_string(),
            coding_rate: lorawan.coding_rate.clone(),
            power: band.default_tx_power,
            score: RX2_SCORE,
        },
    ]
}
