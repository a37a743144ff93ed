//! Active peer counting and RAII guard.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use super::PeerId;

/// Global gauge tracking live peers.
static ACTIVE_PEERS: AtomicU64 = AtomicU64::new(0);

/// RAII guard incrementing [`ACTIVE_PEERS`] on creation and decrementing it
/// on drop.
///
/// Both pump tasks hold a clone of the same `Arc<ActivePeer>`, so the peer
/// counts as live until the last task exits.
pub(super) struct ActivePeer {
    id: PeerId,
}

impl ActivePeer {
    pub(super) fn new(id: PeerId) -> Self {
        ACTIVE_PEERS.fetch_add(1, Ordering::Relaxed);
        crate::metrics::inc_peers();
        Self { id }
    }
}

impl Drop for ActivePeer {
    fn drop(&mut self) {
        let remaining = ACTIVE_PEERS.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        crate::metrics::dec_peers();
        info!("peer closed: id={}, active_peers={remaining}", self.id);
    }
}

/// Return the current number of live peers in this process.
#[must_use]
pub fn active_peer_count() -> u64 { ACTIVE_PEERS.load(Ordering::Relaxed) }

/// Load the current count for logging purposes.
pub(super) fn current_count() -> u64 { ACTIVE_PEERS.load(Ordering::Relaxed) }
