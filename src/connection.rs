//! Connection contract consumed by the peer.
//!
//! A [`Connection`] is an already-established, framed duplex stream. The
//! peer splits it once: the inbound pump owns the [`FrameReader`] and the
//! outbound pump owns the [`FrameWriter`], so no half is ever touched by
//! both tasks.
//!
//! Deadlines on control frames are applied by the caller with
//! [`tokio::time::timeout`]; implementations only need to make writes
//! cancel-safe enough to be dropped mid-flight.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::ConnectionError, frame::Frame};

/// Callback invoked with the payload of every pong read from the connection.
pub type PongHandler = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Reading half of a connection.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Read the next frame.
    ///
    /// Pong frames are reported to the registered [`PongHandler`]; whether
    /// they are also returned is up to the implementation, and the peer
    /// ignores them either way.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`] when the stream fails or ends.
    async fn read_frame(&mut self) -> Result<Frame, ConnectionError>;

    /// Register the callback run for each pong received.
    fn set_pong_handler(&mut self, handler: PongHandler);
}

/// Writing half of a connection.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Write a data or control frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`] if the frame could not be written.
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`] if the transport reports a failure while
    /// shutting down.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// A duplex framed connection that can be split into its two halves.
pub trait Connection: Send + 'static {
    /// Reading half.
    type Reader: FrameReader;
    /// Writing half.
    type Writer: FrameWriter;

    /// Split the connection into its reading and writing halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}
