//! Regional band parameters.
//!
//! A static table keyed by region name, as reported in gateway status.
//! Only the values the router needs to build downlink options and
//! activation metadata are carried here.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BandError {
    #[error("unknown region {0:?}")]
    UnknownRegion(String),
}

/// How the RX1 downlink channel is derived from the uplink channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rx1Plan {
    /// RX1 uses the uplink frequency and data rate.
    SameAsUplink,
    /// 902–928 MHz plans: 8 downlink channels of 500 kHz starting at 923.3 MHz.
    Downlink500 { uplink_base: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub region: &'static str,
    pub rx2_frequency: u64,
    pub rx2_data_rate: u8,
    pub rx2_data_rate_name: &'static str,
    pub receive_delay1: Duration,
    pub receive_delay2: Duration,
    pub join_accept_delay1: Duration,
    pub join_accept_delay2: Duration,
    /// Default downlink power in dBm.
    pub default_tx_power: i32,
    pub rx1_plan: Rx1Plan,
    /// Extra channels sent in the join-accept, if the region defines them.
    pub cf_list: Option<&'static [u64]>,
}

const EU_CF_LIST: &[u64] = &[867_100_000, 867_300_000, 867_500_000, 867_700_000, 867_900_000];

const RX1_DOWNLINK_BASE: u64 = 923_300_000;
const RX1_DOWNLINK_STEP: u64 = 600_000;
const UPLINK_125_STEP: u64 = 200_000;

const fn band(
    region: &'static str,
    rx2_frequency: u64,
    rx2_data_rate: u8,
    rx2_data_rate_name: &'static str,
    default_tx_power: i32,
    rx1_plan: Rx1Plan,
    cf_list: Option<&'static [u64]>,
) -> Band {
    Band {
        region,
        rx2_frequency,
        rx2_data_rate,
        rx2_data_rate_name,
        receive_delay1: Duration::from_secs(1),
        receive_delay2: Duration::from_secs(2),
        join_accept_delay1: Duration::from_secs(5),
        join_accept_delay2: Duration::from_secs(6),
        default_tx_power,
        rx1_plan,
        cf_list,
    }
}

static BANDS: [Band; 8] = [
    band("EU_863_870", 869_525_000, 0, "SF12BW125", 14, Rx1Plan::SameAsUplink, Some(EU_CF_LIST)),
    band(
        "US_902_928",
        923_300_000,
        8,
        "SF12BW500",
        20,
        Rx1Plan::Downlink500 { uplink_base: 902_300_000 },
        None,
    ),
    band("CN_779_787", 786_000_000, 0, "SF12BW125", 10, Rx1Plan::SameAsUplink, None),
    band("EU_433", 434_665_000, 0, "SF12BW125", 10, Rx1Plan::SameAsUplink, None),
    band(
        "AU_915_928",
        923_300_000,
        8,
        "SF12BW500",
        20,
        Rx1Plan::Downlink500 { uplink_base: 915_200_000 },
        None,
    ),
    band("CN_470_510", 505_300_000, 0, "SF12BW125", 17, Rx1Plan::SameAsUplink, None),
    band("AS_923", 923_200_000, 2, "SF10BW125", 14, Rx1Plan::SameAsUplink, None),
    band("KR_920_923", 921_900_000, 0, "SF12BW125", 14, Rx1Plan::SameAsUplink, None),
];

/// Look up the band parameters for a region name.
pub fn get_band(region: &str) -> Result<&'static Band, BandError> {
    BANDS
        .iter()
        .find(|b| b.region == region)
        .ok_or_else(|| BandError::UnknownRegion(region.to_string()))
}

impl Band {
    /// RX1 frequency for an uplink received on `uplink_frequency`.
    pub fn rx1_frequency(&self, uplink_frequency: u64) -> u64 {
        match self.rx1_plan {
            Rx1Plan::SameAsUplink => uplink_frequency,
            Rx1Plan::Downlink500 { uplink_base } => {
                let channel = uplink_frequency.saturating_sub(uplink_base) / UPLINK_125_STEP;
                RX1_DOWNLINK_BASE + (channel % 8) * RX1_DOWNLINK_STEP
            }
        }
    }

    /// RX1 data rate for an uplink data rate (RX1DROffset 0).
    pub fn rx1_data_rate(&self, uplink_data_rate: &str) -> String {
        match self.rx1_plan {
            Rx1Plan::SameAsUplink => uplink_data_rate.to_string(),
            Rx1Plan::Downlink500 { .. } => uplink_data_rate.replace("BW125", "BW500"),
        }
    }
}
