//! The peer: one message session bound to one connection.
//!
//! A [`Peer`] owns two tasks. The outbound pump drains a bounded FIFO queue
//! onto the connection and runs the keepalive monitor; the inbound pump reads
//! frames, decodes them and hands messages to the [`Inbound`] stream. The two
//! tasks coordinate only through the queue and a handful of one-shot
//! signals, so the connection's halves are never shared between tasks.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::{
    codec::Codec,
    config::{MIN_RECOMMENDED_KEEPALIVE, PeerConfig},
    connection::{Connection, FrameReader},
    error::SendError,
    message::Message,
};

mod counter;
mod handle;
mod id;
mod inbound;
mod keepalive;
mod outbound;
mod shutdown;
mod signals;

pub use counter::active_peer_count;
pub use handle::PeerHandle;
pub use id::PeerId;
pub use inbound::Inbound;
pub use keepalive::MAX_MISSED_PONGS;

use self::{
    counter::ActivePeer,
    inbound::InboundTask,
    keepalive::{Keepalive, MissedPongs},
    outbound::OutboundTask,
    shutdown::Closing,
    signals::Signals,
};

/// Inbound messages buffered ahead of the application. Delivery is close to a
/// direct hand-off.
const INBOUND_CAPACITY: usize = 1;

/// A running message session.
///
/// Producers enqueue through [`Peer::send`], [`Peer::try_send`] or any
/// [`PeerHandle`] clone; consumers read through [`Peer::recv`] or the stream
/// returned by [`Peer::take_inbound`]. Call [`Peer::close`] to drain pending
/// messages and end the session. Dropping a peer without closing it tears the
/// session down once the remaining handles are gone or the next inbound
/// message finds no reader.
pub struct Peer<M> {
    id: PeerId,
    handle: PeerHandle<M>,
    inbound: Option<Inbound<M>>,
    signals: Signals,
    tasks: TaskTracker,
}

impl<M: Message> Peer<M> {
    /// Start a peer on an open connection.
    ///
    /// Both pumps are spawned immediately on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<Conn, C>(conn: Conn, codec: C, config: PeerConfig) -> Self
    where
        Conn: Connection,
        C: Codec<M>,
    {
        let id = PeerId::next();
        let (mut reader, writer) = conn.split();
        let codec = Arc::new(codec);
        let signals = Signals::new();

        let (out_tx, out_rx) = mpsc::channel(config.queue_capacity());
        let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);
        let handle = PeerHandle::new(id, out_tx, config.send_timeout());

        if config.keepalive_is_aggressive() {
            warn!(
                "keepalive interval below recommended minimum: id={id}, interval={:?}, \
                 minimum={MIN_RECOMMENDED_KEEPALIVE:?}",
                config.keepalive()
            );
        }
        let keepalive = config.keepalive().map(|period| {
            let missed = MissedPongs::default();
            reader.set_pong_handler(missed.pong_handler());
            Keepalive::new(period, missed)
        });

        let active = Arc::new(ActivePeer::new(id));
        info!(
            "peer opened: id={id}, keepalive={:?}, queue_capacity={}, active_peers={}",
            config.keepalive(),
            config.queue_capacity(),
            counter::current_count()
        );

        let outbound = OutboundTask::new(
            id,
            out_rx,
            writer,
            Arc::clone(&codec),
            keepalive,
            config.control_timeout(),
            signals.clone(),
            Arc::clone(&active),
        );
        let inbound = InboundTask::new(
            id,
            reader,
            codec,
            in_tx,
            handle.clone(),
            config.delivery_grace(),
            signals.clone(),
            active,
        );

        let tasks = TaskTracker::new();
        tasks.spawn(outbound.run());
        tasks.spawn(inbound.run());
        tasks.close();

        Self {
            id,
            handle,
            inbound: Some(Inbound::new(in_rx)),
            signals,
            tasks,
        }
    }

    /// Start a peer with [`PeerConfig::default`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_defaults<Conn, C>(conn: Conn, codec: C) -> Self
    where
        Conn: Connection,
        C: Codec<M>,
    {
        Self::new(conn, codec, PeerConfig::default())
    }

    /// Identifier of this peer, as used in its log lines.
    #[must_use]
    pub fn id(&self) -> PeerId { self.id }

    /// A cloneable handle for producers on other tasks.
    #[must_use]
    pub fn handle(&self) -> PeerHandle<M> { self.handle.clone() }

    /// Enqueue a message, waiting as long as needed for queue space.
    ///
    /// # Errors
    ///
    /// See [`PeerHandle::send`].
    pub async fn send(&self, message: M) -> Result<(), SendError> { self.handle.send(message).await }

    /// Enqueue a message, waiting at most the configured send timeout.
    ///
    /// # Errors
    ///
    /// See [`PeerHandle::try_send`].
    pub async fn try_send(&self, message: M) -> Result<(), SendError> {
        self.handle.try_send(message).await
    }

    /// Receive the next inbound message.
    ///
    /// Returns `None` once the session has ended, or if the stream was taken
    /// with [`Peer::take_inbound`].
    pub async fn recv(&mut self) -> Option<M> {
        match self.inbound.as_mut() {
            Some(inbound) => inbound.recv().await,
            None => None,
        }
    }

    /// Take the inbound stream, for example to consume it on another task.
    ///
    /// Returns `None` if it was already taken.
    pub fn take_inbound(&mut self) -> Option<Inbound<M>> { self.inbound.take() }

    /// Returns `true` once the outbound pump has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.signals.writer_done.is_cancelled() }

    /// Close the session.
    ///
    /// Messages queued before the call are written first, then a normal close
    /// frame is sent and the connection is closed. Returns once both pumps
    /// have exited. Sending after `close` fails with [`SendError::Closed`].
    pub async fn close(self) {
        let Self {
            id,
            handle,
            inbound,
            signals,
            tasks,
        } = self;
        Closing {
            id,
            handle,
            inbound,
            signals,
            tasks,
        }
        .run()
        .await;
    }
}

impl<M> std::fmt::Debug for Peer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("closed", &self.signals.writer_done.is_cancelled())
            .finish_non_exhaustive()
    }
}
