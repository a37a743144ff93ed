//! Outbound pump: drains the queue onto the connection and runs keepalive.
//!
//! The pump is the only owner of the connection's writing half. It writes
//! queued messages in FIFO order until the shutdown sentinel arrives, the
//! connection fails, the keepalive monitor gives up, or the inbound pump
//! disappears. On exit it closes the queue, raises `writer_done` and closes
//! the connection exactly once.

use std::{fmt, future, ops::ControlFlow, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{sync::mpsc, time::timeout};

use super::{
    PeerId,
    counter::ActivePeer,
    keepalive::{Keepalive, Tick},
    signals::Signals,
};
use crate::{
    codec::Codec,
    connection::FrameWriter,
    error::ConnectionError,
    frame::{CloseReason, Frame},
    message::{Message, Outbound},
    metrics::{self, Direction},
};

/// Reason given in the close frame sent on a local shutdown.
const CLOSE_REASON: &str = "goodbye";

/// Why the pump loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exit {
    /// The shutdown sentinel was dequeued.
    Shutdown,
    /// Every sender was dropped.
    QueueClosed,
    /// The inbound pump exited; nobody is left to read the remote's replies.
    ReaderGone,
    /// Writing a data frame failed.
    WriteFailed,
    /// Writing a keepalive ping failed.
    PingFailed,
    /// Too many pings went unanswered; the connection was force-closed.
    KeepaliveExpired,
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Exit::Shutdown => "shutdown",
            Exit::QueueClosed => "queue closed",
            Exit::ReaderGone => "reader gone",
            Exit::WriteFailed => "write failed",
            Exit::PingFailed => "ping failed",
            Exit::KeepaliveExpired => "keepalive expired",
        };
        f.write_str(reason)
    }
}

/// Next event observed by the pump loop.
enum Event<M> {
    ReaderGone,
    Tick(Tick),
    Item(Option<Outbound<M>>),
}

/// State owned by the outbound pump task.
pub(super) struct OutboundTask<M, C, W> {
    id: PeerId,
    rx: mpsc::Receiver<Outbound<M>>,
    writer: W,
    codec: Arc<C>,
    keepalive: Option<Keepalive>,
    control_timeout: Duration,
    signals: Signals,
    closed: bool,
    _active: Arc<ActivePeer>,
}

impl<M, C, W> OutboundTask<M, C, W>
where
    M: Message,
    C: Codec<M>,
    W: FrameWriter,
{
    #[expect(
        clippy::too_many_arguments,
        reason = "task state is assembled once by Peer::new"
    )]
    pub(super) fn new(
        id: PeerId,
        rx: mpsc::Receiver<Outbound<M>>,
        writer: W,
        codec: Arc<C>,
        keepalive: Option<Keepalive>,
        control_timeout: Duration,
        signals: Signals,
        active: Arc<ActivePeer>,
    ) -> Self {
        Self {
            id,
            rx,
            writer,
            codec,
            keepalive,
            control_timeout,
            signals,
            closed: false,
            _active: active,
        }
    }

    /// Run the pump to completion.
    pub(super) async fn run(mut self) {
        let exit = self.pump().await;
        // Later sends fail fast and producers blocked on a full queue wake up.
        self.rx.close();
        self.signals.writer_done.cancel();
        debug!("outbound pump stopped: id={}, reason={exit}", self.id);

        if !self.closed {
            self.teardown(exit).await;
        }
        self.signals.conn_closed.cancel();
    }

    async fn pump(&mut self) -> Exit {
        loop {
            let event = tokio::select! {
                biased;

                () = self.signals.reader_gone.cancelled() => Event::ReaderGone,
                tick = next_tick(self.keepalive.as_mut()) => Event::Tick(tick),
                item = self.rx.recv() => Event::Item(item),
            };

            let step = match event {
                Event::ReaderGone => ControlFlow::Break(Exit::ReaderGone),
                Event::Tick(tick) => self.on_tick(tick).await,
                Event::Item(None) => ControlFlow::Break(Exit::QueueClosed),
                Event::Item(Some(Outbound::Shutdown)) => ControlFlow::Break(Exit::Shutdown),
                Event::Item(Some(Outbound::Message(message))) => self.write_message(message).await,
            };
            if let ControlFlow::Break(exit) = step {
                return exit;
            }
        }
    }

    async fn on_tick(&mut self, tick: Tick) -> ControlFlow<Exit> {
        let Some(keepalive) = self.keepalive.as_ref() else {
            return ControlFlow::Continue(());
        };
        match tick {
            Tick::Expired => {
                warn!(
                    "keepalive expired, closing connection: id={}, interval={:?}, missed_pongs={}",
                    self.id,
                    keepalive.period(),
                    keepalive.missed()
                );
                metrics::inc_keepalive_failures();
                self.close_connection().await;
                ControlFlow::Break(Exit::KeepaliveExpired)
            }
            Tick::Ping => match self.write_control(Frame::keepalive_ping()).await {
                Ok(()) => {
                    if let Some(keepalive) = self.keepalive.as_ref() {
                        keepalive.ping_sent();
                    }
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    warn!("keepalive ping failed: id={}, error={e}", self.id);
                    ControlFlow::Break(Exit::PingFailed)
                }
            },
        }
    }

    async fn write_message(&mut self, message: M) -> ControlFlow<Exit> {
        let payload = match self.codec.encode(&message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("dropping outbound message: id={}, error={e}", self.id);
                metrics::inc_codec_errors(Direction::Outbound);
                return ControlFlow::Continue(());
            }
        };
        let frame = Frame::Data {
            kind: self.codec.payload_kind(),
            payload,
        };

        match self.writer.write_frame(frame).await {
            Ok(()) => {
                metrics::inc_frames(Direction::Outbound);
                ControlFlow::Continue(())
            }
            Err(e) if message.is_session_close_ack() => {
                debug!(
                    "write of session close acknowledgement failed: id={}, error={e}",
                    self.id
                );
                ControlFlow::Break(Exit::WriteFailed)
            }
            Err(e) => {
                warn!("write failed: id={}, error={e}", self.id);
                ControlFlow::Break(Exit::WriteFailed)
            }
        }
    }

    /// Close the connection after the loop has stopped.
    ///
    /// A sentinel comes either from `Peer::close` or from the inbound pump's
    /// fallback path. The first raises `explicit_close` and the second
    /// raises `reader_gone`, both only after `writer_done`; the close frame
    /// is sent only for the local case.
    async fn teardown(&mut self, exit: Exit) {
        if exit == Exit::Shutdown {
            let explicit = tokio::select! {
                biased;

                () = self.signals.explicit_close.cancelled() => true,
                () = self.signals.reader_gone.cancelled() => false,
            };
            if explicit {
                let frame = Frame::Close(Some(CloseReason::normal(CLOSE_REASON)));
                if let Err(e) = self.write_control(frame).await {
                    debug!("close frame not sent: id={}, error={e}", self.id);
                }
            }
        }
        self.close_connection().await;
    }

    /// Write a control frame with the configured deadline.
    async fn write_control(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let deadline = self.control_timeout;
        timeout(deadline, self.writer.write_frame(frame))
            .await
            .map_err(|_| ConnectionError::Timeout { deadline })?
    }

    async fn close_connection(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match timeout(self.control_timeout, self.writer.close()).await {
            Ok(Ok(())) => info!("connection closed: id={}", self.id),
            Ok(Err(e)) => debug!("connection close reported error: id={}, error={e}", self.id),
            Err(_) => warn!(
                "connection close timed out: id={}, timeout={:?}",
                self.id, self.control_timeout
            ),
        }
    }
}

/// Wait for the next keepalive tick, or forever when keepalive is off.
async fn next_tick(keepalive: Option<&mut Keepalive>) -> Tick {
    match keepalive {
        Some(keepalive) => keepalive.tick().await,
        None => future::pending().await,
    }
}
