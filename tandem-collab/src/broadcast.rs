//! Fan-out of applied instructions to the other peers of a document.
//!
//! Delivery is a push onto each peer's unbounded outbound queue, so a
//! broadcast never waits on a slow socket. Callers hold the document lock
//! while broadcasting, which keeps the relay order identical to the order
//! edits were applied in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tandem_core::{ConnectionId, DocumentId};

use crate::session::SessionRegistry;

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Frames handed to `broadcast`
    pub broadcasts: u64,
    /// Per-peer deliveries
    pub deliveries: u64,
    /// Peers skipped because their transport had already closed
    pub skipped_closed: u64,
}

#[derive(Default)]
struct AtomicBroadcastStats {
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    skipped_closed: AtomicU64,
}

pub struct Broadcaster {
    sessions: Arc<SessionRegistry>,
    stats: AtomicBroadcastStats,
}

impl Broadcaster {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self {
            sessions,
            stats: AtomicBroadcastStats::default(),
        }
    }

    /// Send `frame` to every open connection associated with `document`,
    /// except `origin`.
    ///
    /// Returns the number of peers the frame was queued for.
    pub fn broadcast(
        &self,
        document: &DocumentId,
        origin: Option<ConnectionId>,
        frame: &str,
    ) -> usize {
        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for peer in self.sessions.peers(document, origin) {
            if peer.is_open() && peer.send(frame) {
                delivered += 1;
            } else {
                self.stats.skipped_closed.fetch_add(1, Ordering::Relaxed);
                log::trace!("Skipping closed peer {} of doc {document}", peer.id());
            }
        }

        self.stats
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        log::trace!("Broadcast to {delivered} peers of doc {document}");
        delivered
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            broadcasts: self.stats.broadcasts.load(Ordering::Relaxed),
            deliveries: self.stats.deliveries.load(Ordering::Relaxed),
            skipped_closed: self.stats.skipped_closed.load(Ordering::Relaxed),
        }
    }
}
