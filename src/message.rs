//! Message contract and the outbound queue item type.

/// An application message carried by a peer.
///
/// The peer never inspects message contents. The only question it asks is
/// whether a message acknowledges the end of the session, so that a write
/// failure racing the remote's close is not reported as an error.
pub trait Message: Send + 'static {
    /// Returns `true` if this message acknowledges session termination
    /// (for example a GOODBYE reply).
    fn is_session_close_ack(&self) -> bool { false }
}

/// Item stored in the outbound queue.
///
/// `Shutdown` tells the outbound pump to stop once everything queued ahead of
/// it has been written. It is never encoded.
#[derive(Debug)]
pub enum Outbound<M> {
    /// A message to encode and write.
    Message(M),
    /// Stop draining the queue.
    Shutdown,
}

impl<M> From<M> for Outbound<M> {
    fn from(message: M) -> Self { Self::Message(message) }
}
