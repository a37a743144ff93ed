//! Frames exchanged with a [`Connection`](crate::connection::Connection).
//!
//! A frame is one discrete unit on the wire: a data frame carrying one
//! encoded message, or a ping/pong/close control frame.

use bytes::Bytes;

/// Close code signalling a normal, intentional shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Payload used for keepalive pings.
pub const KEEPALIVE_PAYLOAD: &[u8] = b"keepalive";

/// Encoding of a data frame's payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadKind {
    /// UTF-8 text payload.
    Text,
    /// Opaque binary payload.
    #[default]
    Binary,
}

/// Code and reason carried by a close control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    /// Numeric close code.
    pub code: u16,
    /// Human readable reason.
    pub reason: String,
}

impl CloseReason {
    /// A [`NORMAL_CLOSURE`] reason with the given text.
    #[must_use]
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: reason.into(),
        }
    }
}

/// One frame read from or written to a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A data frame carrying one encoded message.
    Data {
        /// How `payload` is encoded.
        kind: PayloadKind,
        /// Encoded message bytes.
        payload: Bytes,
    },
    /// Ping control frame.
    Ping(Bytes),
    /// Pong control frame.
    Pong(Bytes),
    /// Close control frame; the remote is ending the session.
    Close(Option<CloseReason>),
}

impl Frame {
    /// Build a text data frame.
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::Data {
            kind: PayloadKind::Text,
            payload: payload.into(),
        }
    }

    /// Build a binary data frame.
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::Data {
            kind: PayloadKind::Binary,
            payload: payload.into(),
        }
    }

    /// The keepalive ping sent by the outbound pump.
    #[must_use]
    pub fn keepalive_ping() -> Self { Self::Ping(Bytes::from_static(KEEPALIVE_PAYLOAD)) }

    /// Returns `true` for close frames.
    #[must_use]
    pub fn is_close(&self) -> bool { matches!(self, Self::Close(_)) }
}
