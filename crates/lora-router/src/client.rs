//! Seams between the router and the outside world.
//!
//! A broker that does not accept a request answers with an error; any
//! `Ok` is an acceptance.

use std::sync::Arc;

use futures::future::BoxFuture;
use lora_core::message::{
    BrokerActivationRequest, BrokerActivationResponse, BrokerUplinkMessage, BrokerUplinkResponse,
    DownlinkMessage,
};
use lora_services::Announcement;

/// A live connection to one broker.
pub trait BrokerClient: Send + Sync {
    fn activate(
        &self,
        request: BrokerActivationRequest,
    ) -> BoxFuture<'_, anyhow::Result<BrokerActivationResponse>>;

    fn uplink(
        &self,
        message: BrokerUplinkMessage,
    ) -> BoxFuture<'_, anyhow::Result<BrokerUplinkResponse>>;
}

/// Turns a directory announcement into a broker connection.
pub trait BrokerConnector: Send + Sync {
    fn connect(&self, announcement: &Announcement) -> anyhow::Result<Arc<dyn BrokerClient>>;
}

/// Delivers an accepted answer back toward the gateway.
pub trait DownlinkSender: Send + Sync {
    fn handle_downlink(&self, message: DownlinkMessage) -> BoxFuture<'_, anyhow::Result<()>>;
}
