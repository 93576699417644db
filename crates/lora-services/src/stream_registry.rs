//! Stream registry — one live outbound channel per peer identity.
//!
//! The registry owns the only sender of every stream. `activate` hands the
//! receiving end to the caller; `deactivate` drops the sender, which ends
//! the stream for the consumer once it has drained what was queued.
//! Delivery happens under the map's shard lock, so a stream is never
//! written to after it has been removed.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("stream {0} already active")]
    AlreadyActive(String),
    #[error("stream {0} not active")]
    NotActive(String),
    #[error("stream {0} is full")]
    Full(String),
    /// The consumer dropped its receiver without deactivating.
    #[error("stream {0} closed by consumer")]
    Closed(String),
}

pub struct StreamRegistry<T> {
    /// Human-readable kind, used in logs ("router", "handler", "gateway").
    kind: &'static str,
    capacity: usize,
    streams: DashMap<String, mpsc::Sender<T>>,
}

impl<T: Send + 'static> StreamRegistry<T> {
    pub fn new(kind: &'static str, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            streams: DashMap::new(),
        }
    }

    /// Open the stream for `id`. Fails without side effects if one is
    /// already open.
    pub fn activate(&self, id: &str) -> Result<mpsc::Receiver<T>, RegistryError> {
        match self.streams.entry(id.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(kind = self.kind, id, "stream already active");
                Err(RegistryError::AlreadyActive(id.to_string()))
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(self.capacity);
                slot.insert(tx);
                tracing::info!(kind = self.kind, id, "stream activated");
                Ok(rx)
            }
        }
    }

    /// Close and forget the stream for `id`.
    pub fn deactivate(&self, id: &str) -> Result<(), RegistryError> {
        match self.streams.remove(id) {
            Some(_) => {
                tracing::info!(kind = self.kind, id, "stream deactivated");
                Ok(())
            }
            None => Err(RegistryError::NotActive(id.to_string())),
        }
    }

    /// Queue `msg` on the stream for `id` without waiting.
    pub fn send(&self, id: &str, msg: T) -> Result<(), RegistryError> {
        let Some(tx) = self.streams.get(id) else {
            return Err(RegistryError::NotActive(id.to_string()));
        };
        tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!(kind = self.kind, id, "stream full, message dropped");
                RegistryError::Full(id.to_string())
            }
            TrySendError::Closed(_) => RegistryError::Closed(id.to_string()),
        })
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.streams.contains_key(id)
    }

    /// Identities with an open stream, sorted.
    pub fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
