//! Inbound pump and the stream of received messages.

use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use futures::Stream;
use log::{debug, info, warn};
use tokio::{sync::mpsc, time::timeout};

use super::{PeerHandle, PeerId, counter::ActivePeer, signals::Signals};
use crate::{
    codec::Codec,
    connection::FrameReader,
    error::ConnectionError,
    frame::Frame,
    message::Message,
    metrics::{self, Direction},
};

/// Messages received from the remote, in arrival order.
///
/// The stream ends once the inbound pump exits, whether because the remote
/// closed the session, the connection failed, or the peer was closed
/// locally. It cannot be restarted.
#[derive(Debug)]
pub struct Inbound<M> {
    rx: mpsc::Receiver<M>,
}

impl<M> Inbound<M> {
    pub(super) fn new(rx: mpsc::Receiver<M>) -> Self { Self { rx } }

    /// Receive the next message, or `None` once the peer has ended.
    pub async fn recv(&mut self) -> Option<M> { self.rx.recv().await }
}

impl<M> Stream for Inbound<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<M>> {
        self.rx.poll_recv(cx)
    }
}

/// Why the inbound pump stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exit {
    /// The remote sent a close frame.
    RemoteClosed,
    /// A read failed without a local close; the outbound queue was drained.
    Disconnected,
    /// A read failed after the peer was closed locally.
    Closing,
    /// A message was still undelivered when the grace period ran out.
    DeliveryAbandoned,
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Exit::RemoteClosed => "remote closed",
            Exit::Disconnected => "disconnected",
            Exit::Closing => "closing",
            Exit::DeliveryAbandoned => "delivery abandoned",
        };
        f.write_str(reason)
    }
}

/// State owned by the inbound pump task.
pub(super) struct InboundTask<M, C, R> {
    id: PeerId,
    reader: R,
    codec: Arc<C>,
    tx: mpsc::Sender<M>,
    outbound: PeerHandle<M>,
    grace: Duration,
    signals: Signals,
    _active: Arc<ActivePeer>,
}

impl<M, C, R> InboundTask<M, C, R>
where
    M: Message,
    C: Codec<M>,
    R: FrameReader,
{
    #[expect(
        clippy::too_many_arguments,
        reason = "task state is assembled once by Peer::new"
    )]
    pub(super) fn new(
        id: PeerId,
        reader: R,
        codec: Arc<C>,
        tx: mpsc::Sender<M>,
        outbound: PeerHandle<M>,
        grace: Duration,
        signals: Signals,
        active: Arc<ActivePeer>,
    ) -> Self {
        Self {
            id,
            reader,
            codec,
            tx,
            outbound,
            grace,
            signals,
            _active: active,
        }
    }

    /// Run the pump to completion. Dropping the sender ends the stream.
    pub(super) async fn run(mut self) {
        let exit = self.pump().await;
        match exit {
            Exit::DeliveryAbandoned => warn!(
                "inbound pump stopped: id={}, reason={exit}, grace={:?}",
                self.id, self.grace
            ),
            _ => debug!("inbound pump stopped: id={}, reason={exit}", self.id),
        }
        self.signals.reader_gone.cancel();
    }

    async fn pump(&mut self) -> Exit {
        loop {
            let frame = match self.read().await {
                Ok(frame) => frame,
                Err(e) => return self.on_read_error(&e).await,
            };

            let payload = match frame {
                Frame::Data { payload, .. } => payload,
                Frame::Close(reason) => {
                    info!("remote closed session: id={}, reason={reason:?}", self.id);
                    return Exit::RemoteClosed;
                }
                Frame::Ping(_) | Frame::Pong(_) => continue,
            };
            metrics::inc_frames(Direction::Inbound);

            let message = match self.codec.decode(&payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(
                        "dropping inbound frame: id={}, len={}, error={e}",
                        self.id,
                        payload.len()
                    );
                    metrics::inc_codec_errors(Direction::Inbound);
                    continue;
                }
            };

            if let Some(exit) = self.deliver(message).await {
                return exit;
            }
        }
    }

    /// Read the next frame, giving up as soon as the connection is closed.
    async fn read(&mut self) -> Result<Frame, ConnectionError> {
        tokio::select! {
            biased;

            () = self.signals.conn_closed.cancelled() => Err(ConnectionError::Closed),
            frame = self.reader.read_frame() => frame,
        }
    }

    async fn on_read_error(&mut self, error: &ConnectionError) -> Exit {
        if self.signals.explicit_close.is_cancelled() {
            return Exit::Closing;
        }
        if error.is_closed() {
            info!("connection closed by remote: id={}", self.id);
        } else {
            warn!("read failed: id={}, error={error}", self.id);
        }
        // A closed queue means the outbound pump is already on its way out.
        let _ = self.outbound.request_shutdown().await;
        self.signals.writer_done.cancelled().await;
        Exit::Disconnected
    }

    /// Hand one message to the application.
    ///
    /// Blocks until the consumer makes room. Once a local close is requested
    /// the delivery gets one grace period before it is abandoned; either way
    /// the pump then stops. A dropped stream discards the message and the
    /// pump keeps reading, so the session outlives its consumer.
    async fn deliver(&mut self, message: M) -> Option<Exit> {
        let reserved = tokio::select! {
            biased;

            permit = self.tx.reserve() => Some(permit),
            () = self.signals.explicit_close.cancelled() => None,
        };

        match reserved {
            Some(Ok(permit)) => {
                permit.send(message);
                None
            }
            Some(Err(_)) => {
                debug!("discarding inbound message: id={}, reason=stream dropped", self.id);
                None
            }
            None => match timeout(self.grace, self.tx.reserve()).await {
                Ok(Ok(permit)) => {
                    permit.send(message);
                    Some(Exit::Closing)
                }
                Ok(Err(_)) => Some(Exit::Closing),
                Err(_) => Some(Exit::DeliveryAbandoned),
            },
        }
    }
}
