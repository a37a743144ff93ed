//! Metric helpers for `peerlink`.
//!
//! This module defines metric names and thin helpers over the
//! [`metrics`](https://docs.rs/metrics) facade. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking live peers.
pub const PEERS_ACTIVE: &str = "peerlink_peers_active";
/// Name of the counter tracking frames carrying messages.
pub const FRAMES_TOTAL: &str = "peerlink_frames_total";
/// Name of the counter tracking messages dropped by the codec.
pub const CODEC_ERRORS_TOTAL: &str = "peerlink_codec_errors_total";
/// Name of the counter tracking connections closed for missing pongs.
pub const KEEPALIVE_FAILURES_TOTAL: &str = "peerlink_keepalive_failures_total";

/// Direction of a frame relative to the local peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Read from the connection.
    Inbound,
    /// Written to the connection.
    Outbound,
}

impl Direction {
    /// Label value used for this direction.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active peers gauge.
pub fn inc_peers() {
    #[cfg(feature = "metrics")]
    gauge!(PEERS_ACTIVE).increment(1.0);
}

/// Decrement the active peers gauge.
pub fn dec_peers() {
    #[cfg(feature = "metrics")]
    gauge!(PEERS_ACTIVE).decrement(1.0);
}

/// Record a data frame moving in `direction`.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a message dropped because it failed to encode or decode.
pub fn inc_codec_errors(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(CODEC_ERRORS_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a connection force-closed by the keepalive monitor.
pub fn inc_keepalive_failures() {
    #[cfg(feature = "metrics")]
    counter!(KEEPALIVE_FAILURES_TOTAL).increment(1);
}
