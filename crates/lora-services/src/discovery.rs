//! Peer directory — where routers learn which brokers exist.

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use lora_core::{DevAddr, DevAddrPrefix};

/// A service instance announced to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Unique instance id; connections are cached under it.
    pub id: String,
    pub service_name: String,
    pub net_address: String,
    /// DevAddr ranges the instance is responsible for.
    pub prefixes: Vec<DevAddrPrefix>,
}

impl Announcement {
    pub fn handles(&self, addr: &DevAddr) -> bool {
        self.prefixes.iter().any(|p| p.matches(addr))
    }
}

/// Directory lookup. Called on every request, so implementations return
/// the current view rather than a snapshot taken at startup.
pub trait PeerDirectory: Send + Sync {
    fn all(&self) -> BoxFuture<'_, anyhow::Result<Vec<Announcement>>>;

    /// Announcements with a prefix matching `addr`.
    fn discover(&self, addr: DevAddr) -> BoxFuture<'_, anyhow::Result<Vec<Announcement>>>;
}

/// In-process directory fed by explicit `announce`/`remove` calls.
#[derive(Default)]
pub struct StaticDirectory {
    entries: DashMap<String, Announcement>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the announcement with the same id.
    pub fn announce(&self, announcement: Announcement) {
        tracing::info!(
            id = %announcement.id,
            service = %announcement.service_name,
            address = %announcement.net_address,
            "service announced"
        );
        self.entries.insert(announcement.id.clone(), announcement);
    }

    pub fn remove(&self, id: &str) -> Option<Announcement> {
        let removed = self.entries.remove(id).map(|(_, a)| a);
        if removed.is_some() {
            tracing::info!(id, "service removed");
        }
        removed
    }

    fn snapshot(&self, filter: impl Fn(&Announcement) -> bool) -> Vec<Announcement> {
        let mut out: Vec<Announcement> = self
            .entries
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

impl PeerDirectory for StaticDirectory {
    fn all(&self) -> BoxFuture<'_, anyhow::Result<Vec<Announcement>>> {
        Box::pin(future::ready(Ok(self.snapshot(|_| true))))
    }

    fn discover(&self, addr: DevAddr) -> BoxFuture<'_, anyhow::Result<Vec<Announcement>>> {
        Box::pin(future::ready(Ok(self.snapshot(|a| a.handles(&addr)))))
    }
}
