//! Cloneable handle used by producers to enqueue outbound messages.

use std::time::Duration;

use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TrySendError},
};
use tracing::{debug, warn};

use super::PeerId;
use crate::{error::SendError, message::Outbound};

/// Cloneable sending side of a peer.
///
/// Every clone feeds the same bounded FIFO queue, drained by the peer's
/// single outbound pump, so messages from one producer reach the connection
/// in the order they were enqueued.
pub struct PeerHandle<M> {
    peer: PeerId,
    tx: mpsc::Sender<Outbound<M>>,
    send_timeout: Duration,
}

impl<M> Clone for PeerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            peer: self.peer,
            tx: self.tx.clone(),
            send_timeout: self.send_timeout,
        }
    }
}

impl<M: Send + 'static> PeerHandle<M> {
    pub(super) fn new(peer: PeerId, tx: mpsc::Sender<Outbound<M>>, send_timeout: Duration) -> Self {
        Self {
            peer,
            tx,
            send_timeout,
        }
    }

    /// Identifier of the peer this handle sends to.
    #[must_use]
    pub fn peer_id(&self) -> PeerId { self.peer }

    /// Enqueue a message, waiting as long as it takes for queue space.
    ///
    /// There is no timeout: a peer that stops draining holds the caller until
    /// its connection fails. Use [`PeerHandle::try_send`] to bound the wait.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the outbound pump has already exited.
    pub async fn send(&self, message: M) -> Result<(), SendError> {
        self.tx
            .send(Outbound::Message(message))
            .await
            .map_err(|_| SendError::Closed)?;
        debug!(peer = %self.peer, "message queued");
        Ok(())
    }

    /// Enqueue a message, waiting at most the configured send timeout.
    ///
    /// The common unsaturated case completes without waiting. When the queue
    /// is full the call waits for space until the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Backpressure`] if the queue stayed full for the
    /// whole timeout; the message is discarded. Returns
    /// [`SendError::Closed`] if the outbound pump has exited.
    pub async fn try_send(&self, message: M) -> Result<(), SendError> {
        let item = match self.tx.try_send(Outbound::Message(message)) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(SendError::Closed),
            Err(TrySendError::Full(item)) => item,
        };

        match self.tx.send_timeout(item, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(
                    peer = %self.peer,
                    timeout = ?self.send_timeout,
                    "outbound queue full, message rejected"
                );
                Err(SendError::Backpressure {
                    waited: self.send_timeout,
                })
            }
            Err(SendTimeoutError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Returns `true` once the outbound pump has stopped accepting messages.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }

    /// Enqueue the shutdown sentinel behind any queued messages.
    ///
    /// Returns `false` if the queue was already closed, meaning the outbound
    /// pump has exited.
    pub(super) async fn request_shutdown(&self) -> bool {
        self.tx.send(Outbound::Shutdown).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tokio::time::Instant;

    use super::*;

    type Queue = (PeerHandle<u8>, mpsc::Receiver<Outbound<u8>>);

    const CAPACITY: usize = 4;
    const TIMEOUT: Duration = Duration::from_secs(1);

    #[fixture]
    fn queue() -> Queue {
        let (tx, rx) = mpsc::channel(CAPACITY);
        (PeerHandle::new(PeerId::next(), tx, TIMEOUT), rx)
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn try_send_fills_capacity_then_reports_backpressure(queue: Queue) {
        let (handle, _rx) = queue;
        let start = Instant::now();
        for i in 0..u8::try_from(CAPACITY).expect("capacity fits u8") {
            handle.try_send(i).await.expect("queue has space");
        }
        assert_eq!(start.elapsed(), Duration::ZERO, "fast path must not wait");

        let err = handle.try_send(99).await.expect_err("queue is full");
        assert_eq!(err, SendError::Backpressure { waited: TIMEOUT });
        assert!(start.elapsed() >= TIMEOUT);
        assert!(start.elapsed() < TIMEOUT * 2);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn try_send_succeeds_when_space_frees_before_timeout(queue: Queue) {
        let (handle, mut rx) = queue;
        for i in 0..u8::try_from(CAPACITY).expect("capacity fits u8") {
            handle.try_send(i).await.expect("queue has space");
        }
        let drain = tokio::spawn(async move {
            tokio::time::sleep(TIMEOUT / 2).await;
            let first = rx.recv().await;
            (first, rx)
        });
        handle.try_send(42).await.expect("space freed in time");
        let (first, _rx) = drain.await.expect("drain task panicked");
        assert!(matches!(first, Some(Outbound::Message(0))));
    }

    #[rstest]
    #[tokio::test]
    async fn sends_fail_once_queue_is_closed(queue: Queue) {
        let (handle, mut rx) = queue;
        rx.close();
        assert!(handle.is_closed());
        assert_eq!(handle.send(1).await, Err(SendError::Closed));
        assert_eq!(handle.try_send(2).await, Err(SendError::Closed));
        assert!(!handle.request_shutdown().await);
    }

    #[rstest]
    #[tokio::test]
    async fn sentinel_follows_queued_messages(queue: Queue) {
        let (handle, mut rx) = queue;
        handle.send(1).await.expect("queue has space");
        assert!(handle.request_shutdown().await);
        assert!(matches!(rx.recv().await, Some(Outbound::Message(1))));
        assert!(matches!(rx.recv().await, Some(Outbound::Shutdown)));
    }
}
