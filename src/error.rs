//! Error types for the peer and its collaborators.
//!
//! The taxonomy separates failures by who sees them:
//!
//! - [`ConnectionError`]: transport read/write failures. Fatal to the peer, and only visible to the
//!   application as the end of the inbound stream.
//! - [`CodecError`]: a single message could not be encoded or decoded. The message is dropped and
//!   the peer stays open.
//! - [`SendError`]: returned synchronously from [`crate::PeerHandle::send`] and
//!   [`crate::PeerHandle::try_send`].
//! - [`PeerConfigError`]: rejected configuration values.

use std::{error::Error, io, time::Duration};

use thiserror::Error;

/// Boxed error used for failures originating in third-party code.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Transport-level failure reading or writing a frame.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection has already been closed, locally or by the remote.
    #[error("connection closed")]
    Closed,
    /// An I/O error surfaced by the underlying stream.
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),
    /// A write did not complete before its deadline.
    #[error("write did not complete within {deadline:?}")]
    Timeout {
        /// Deadline applied to the write.
        deadline: Duration,
    },
    /// Any other error reported by the transport implementation.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

impl ConnectionError {
    /// Wrap an arbitrary transport error.
    pub fn transport(error: impl Into<BoxError>) -> Self { Self::Transport(error.into()) }

    /// Returns `true` if the error reports an already-closed connection.
    #[must_use]
    pub fn is_closed(&self) -> bool { matches!(self, Self::Closed) }
}

/// Failure encoding or decoding one message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] BoxError),
    /// The payload could not be deserialized into a message.
    #[error("failed to decode message: {0}")]
    Decode(#[source] BoxError),
}

impl CodecError {
    /// Build an [`CodecError::Encode`] from any error.
    pub fn encode(error: impl Into<BoxError>) -> Self { Self::Encode(error.into()) }

    /// Build a [`CodecError::Decode`] from any error.
    pub fn decode(error: impl Into<BoxError>) -> Self { Self::Decode(error.into()) }
}

/// Errors returned when enqueuing an outbound message.
#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The outbound queue stayed full for the whole send timeout. The
    /// message was neither sent nor queued.
    #[error("outbound queue full after waiting {waited:?}")]
    Backpressure {
        /// How long the call waited for space.
        waited: Duration,
    },
    /// The outbound pump has exited; the peer no longer accepts messages.
    #[error("peer closed")]
    Closed,
}

/// Errors returned when building a [`crate::PeerConfig`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerConfigError {
    /// The outbound queue capacity was zero.
    #[error("invalid queue capacity {0}; must be >= 1")]
    InvalidCapacity(usize),
    /// A timeout that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}
