//! Per-gateway state held by the router: last reported status and traffic
//! counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use lora_core::message::GatewayStatus;
use lora_core::GatewayEui;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway {0} has not reported a status")]
    StatusUnavailable(GatewayEui),
}

/// A gateway as seen by the router.
pub struct Gateway {
    pub eui: GatewayEui,
    pub status: StatusStore,
    pub utilization: Utilization,
}

impl Gateway {
    pub fn new(eui: GatewayEui) -> Self {
        Self {
            eui,
            status: StatusStore::new(eui),
            utilization: Utilization::default(),
        }
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Latest status reported by one gateway.
pub struct StatusStore {
    eui: GatewayEui,
    last: RwLock<Option<GatewayStatus>>,
}

impl StatusStore {
    pub fn new(eui: GatewayEui) -> Self {
        Self {
            eui,
            last: RwLock::new(None),
        }
    }

    pub fn update(&self, status: GatewayStatus) {
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    pub fn get(&self) -> Result<GatewayStatus, GatewayError> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GatewayError::StatusUnavailable(self.eui))
    }
}

// ── Utilization ───────────────────────────────────────────────────────────────

/// Frame counters over a sliding window.
///
/// `add_rx`/`add_tx` count into the current window; `tick` closes it and
/// makes its totals visible through `get`.
#[derive(Default)]
pub struct Utilization {
    rx_current: AtomicU64,
    tx_current: AtomicU64,
    rx_last: AtomicU64,
    tx_last: AtomicU64,
}

impl Utilization {
    pub fn add_rx(&self) {
        self.rx_current.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tx(&self) {
        self.tx_current.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick(&self) {
        let rx = self.rx_current.swap(0, Ordering::Relaxed);
        let tx = self.tx_current.swap(0, Ordering::Relaxed);
        self.rx_last.store(rx, Ordering::Relaxed);
        self.tx_last.store(tx, Ordering::Relaxed);
    }

    /// (rx, tx) frames in the last closed window.
    pub fn get(&self) -> (u64, u64) {
        (
            self.rx_last.load(Ordering::Relaxed),
            self.tx_last.load(Ordering::Relaxed),
        )
    }
}
