//! lora-core — identifiers, protocol messages, band parameters and
//! configuration. All other crates in the workspace depend on this one.

pub mod band;
pub mod config;
pub mod message;
pub mod types;

pub use band::{get_band, Band, BandError};
pub use types::{AppEui, DevAddr, DevAddrPrefix, DevEui, GatewayEui, IdError, NwkSKey};
