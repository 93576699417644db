use std::fmt;

use lora_core::BandError;
use lora_services::{GatewayError, RegistryError};

/// What a race was run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Activation,
    Uplink,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Activation => f.write_str("activation"),
            RequestKind::Uplink => f.write_str("uplink"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    GatewayStatus(#[from] GatewayError),
    #[error(transparent)]
    Band(#[from] BandError),
    #[error("peer discovery failed: {0}")]
    Discovery(#[source] anyhow::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),
    /// No broker accepted, or no accepted answer could be delivered.
    #[error("{0} not accepted at this gateway")]
    NotAccepted(RequestKind),
    #[error("downlink carries no downlink option")]
    MissingDownlinkOption,
    #[error("downlink delivery failed: {0}")]
    Downlink(#[from] RegistryError),
}

impl RouterError {
    pub fn is_not_accepted(&self) -> bool {
        matches!(self, Self::NotAccepted(_))
    }
}
