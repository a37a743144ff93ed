//! Process-unique peer identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to each peer when it is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Allocate the next identifier.
    pub(crate) fn next() -> Self { Self(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl From<u64> for PeerId {
    fn from(value: u64) -> Self { Self(value) }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}
