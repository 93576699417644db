//! Fan-out race: ask every peer at once, deliver the first acceptance.
//!
//! One task per peer, each bounded by the request deadline, writes at most
//! one answer into a queue sized to the peer count. Every task owns a
//! sender of that queue, so the queue closes exactly when the last task has
//! finished. Answers are drained in arrival order: the first one is
//! delivered as a downlink; if delivery fails the next queued answer takes
//! its place. Once one delivery succeeds, later answers are duplicates and
//! only logged. Peers that have not answered when a delivery fails are not
//! waited for again beyond the normal drain.

use std::future::Future;

use lora_core::message::DownlinkMessage;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::client::DownlinkSender;
use crate::error::{RequestKind, RouterError};

/// How a successful race went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceOutcome {
    /// Peer whose answer was delivered.
    pub accepted: String,
    /// Answers received in total, including duplicates.
    pub responses: usize,
    /// Deliveries attempted, including failed ones.
    pub deliveries: usize,
}

/// Run `call` against every peer and deliver the first accepted answer.
///
/// `to_downlink` turns an answer into the downlink to deliver; an answer
/// without a downlink counts as delivered. Fails with
/// [`RouterError::NotAccepted`] when `peers` is empty, no peer answers
/// before `deadline`, or every delivery fails.
pub async fn race<P, R, Fut>(
    kind: RequestKind,
    peers: Vec<(String, P)>,
    call: impl Fn(P) -> Fut,
    deadline: Instant,
    sender: &dyn DownlinkSender,
    to_downlink: impl Fn(R) -> Option<DownlinkMessage>,
) -> Result<RaceOutcome, RouterError>
where
    P: Send + 'static,
    R: Send + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    if peers.is_empty() {
        tracing::debug!(%kind, "no peers to forward to");
        return Err(RouterError::NotAccepted(kind));
    }

    let (tx, mut rx) = mpsc::channel::<(String, R)>(peers.len());
    let mut tasks = JoinSet::new();
    for (id, peer) in peers {
        let tx = tx.clone();
        let request = call(peer);
        tasks.spawn(async move {
            match timeout_at(deadline, request).await {
                Ok(Ok(answer)) => {
                    // capacity equals the peer count, so this never waits
                    let _ = tx.send((id, answer)).await;
                }
                Ok(Err(e)) => tracing::debug!(%kind, peer = %id, error = %e, "peer did not accept"),
                Err(_) => tracing::debug!(%kind, peer = %id, "peer timed out"),
            }
        });
    }
    drop(tx);

    let mut accepted: Option<String> = None;
    let mut responses = 0;
    let mut deliveries = 0;
    while let Some((id, answer)) = rx.recv().await {
        responses += 1;
        if let Some(winner) = &accepted {
            tracing::debug!(%kind, peer = %id, %winner, "duplicate response ignored");
            continue;
        }
        let Some(downlink) = to_downlink(answer) else {
            tracing::info!(%kind, peer = %id, "accepted without downlink");
            accepted = Some(id);
            continue;
        };
        deliveries += 1;
        match sender.handle_downlink(downlink).await {
            Ok(()) => {
                tracing::info!(%kind, peer = %id, "accepted");
                accepted = Some(id);
            }
            Err(e) => {
                tracing::warn!(%kind, peer = %id, error = %e, "downlink delivery failed, trying next response");
            }
        }
    }

    // The queue is closed, so every task has returned; reap them.
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(%kind, error = %e, "peer task failed");
        }
    }

    match accepted {
        Some(accepted) => Ok(RaceOutcome {
            accepted,
            responses,
            deliveries,
        }),
        None => Err(RouterError::NotAccepted(kind)),
    }
}
