//! lora-router — the gateway-facing half of the routing core.
//!
//! A [`Router`] accepts uplinks and activation requests from gateways,
//! forwards them to every relevant broker at once and delivers the first
//! accepted answer back to the gateway as a downlink.

mod activation;
pub mod client;
pub mod downlink;
pub mod error;
pub mod race;
pub mod router;
mod uplink;


pub use client::{BrokerClient, BrokerConnector, DownlinkSender};
pub use error::{RequestKind, RouterError};
pub use race::{race, RaceOutcome};
pub use router::Router;
