//! In-memory connection and the remote end that drives it.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use peerlink::{
    CloseReason,
    Connection,
    ConnectionError,
    Frame,
    FrameReader,
    FrameWriter,
    Peer,
    PeerConfig,
    PongHandler,
};
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};

use crate::message::{TestCodec, TestMessage};

/// How the remote answers keepalive pings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PongPolicy {
    /// Never answer.
    Ignore,
    /// Answer after `delay`, for at most `limit` pings if set.
    Respond {
        /// Time between the ping being written and the pong being read.
        delay: Duration,
        /// Stop answering after this many pongs.
        limit: Option<usize>,
    },
}

impl PongPolicy {
    /// Answer every ping immediately.
    pub fn immediate() -> Self {
        Self::Respond {
            delay: Duration::ZERO,
            limit: None,
        }
    }
}

/// A frame written by the peer and when it was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Written {
    /// Time the write completed.
    pub at: Instant,
    /// The frame itself.
    pub frame: Frame,
}

type Incoming = Result<Frame, ConnectionError>;

struct Shared {
    written: Mutex<Vec<Written>>,
    written_count: watch::Sender<usize>,
    write_attempts: watch::Sender<usize>,
    writes_paused: watch::Sender<bool>,
    fail_writes: AtomicBool,
    closed: watch::Sender<bool>,
    close_count: AtomicUsize,
    pongs_sent: AtomicUsize,
    pong_policy: Mutex<PongPolicy>,
    incoming: mpsc::UnboundedSender<Incoming>,
}

impl Shared {
    fn record(&self, frame: Frame) {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        written.push(Written {
            at: Instant::now(),
            frame,
        });
        let len = written.len();
        drop(written);
        self.written_count.send_replace(len);
    }

    fn answer_ping(&self, payload: Bytes) {
        let policy = *self.pong_policy.lock().unwrap_or_else(PoisonError::into_inner);
        let PongPolicy::Respond { delay, limit } = policy else {
            return;
        };
        let sent = self.pongs_sent.fetch_add(1, Ordering::SeqCst);
        if limit.is_some_and(|limit| sent >= limit) {
            return;
        }
        let incoming = self.incoming.clone();
        if delay.is_zero() {
            let _ = incoming.send(Ok(Frame::Pong(payload)));
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = incoming.send(Ok(Frame::Pong(payload)));
            });
        }
    }
}

/// Create a connected mock connection and its remote, answering pings
/// immediately.
pub fn mock_connection() -> (MockConnection, MockRemote) {
    mock_connection_with(PongPolicy::immediate())
}

/// Create a connected mock connection whose remote follows `policy`.
pub fn mock_connection_with(policy: PongPolicy) -> (MockConnection, MockRemote) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        written: Mutex::new(Vec::new()),
        written_count: watch::Sender::new(0),
        write_attempts: watch::Sender::new(0),
        writes_paused: watch::Sender::new(false),
        fail_writes: AtomicBool::new(false),
        closed: watch::Sender::new(false),
        close_count: AtomicUsize::new(0),
        pongs_sent: AtomicUsize::new(0),
        pong_policy: Mutex::new(policy),
        incoming: incoming_tx,
    });
    let conn = MockConnection {
        reader: MockReader {
            incoming: incoming_rx,
            on_pong: None,
        },
        writer: MockWriter {
            shared: Arc::clone(&shared),
        },
    };
    (conn, MockRemote { shared })
}

/// Start a [`Peer`] using [`TestCodec`] on a fresh mock connection.
pub fn spawn_peer(config: PeerConfig) -> (Peer<TestMessage>, MockRemote) {
    let (conn, remote) = mock_connection();
    (Peer::new(conn, TestCodec, config), remote)
}

/// Connection handed to the peer under test.
pub struct MockConnection {
    reader: MockReader,
    writer: MockWriter,
}

impl Connection for MockConnection {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> (Self::Reader, Self::Writer) { (self.reader, self.writer) }
}

/// Reading half of a [`MockConnection`].
pub struct MockReader {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    on_pong: Option<PongHandler>,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn read_frame(&mut self) -> Result<Frame, ConnectionError> {
        loop {
            match self.incoming.recv().await {
                Some(Ok(Frame::Pong(payload))) => {
                    if let Some(handler) = &self.on_pong {
                        handler(&payload);
                    }
                }
                Some(result) => return result,
                None => return Err(ConnectionError::Closed),
            }
        }
    }

    fn set_pong_handler(&mut self, handler: PongHandler) { self.on_pong = Some(handler); }
}

/// Writing half of a [`MockConnection`].
pub struct MockWriter {
    shared: Arc<Shared>,
}

#[async_trait]
impl FrameWriter for MockWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.shared.write_attempts.send_modify(|n| *n += 1);
        let mut paused = self.shared.writes_paused.subscribe();
        // The sender lives in `shared`, so the wait cannot fail.
        let _ = paused.wait_for(|paused| !*paused).await;

        if *self.shared.closed.borrow() {
            return Err(ConnectionError::Closed);
        }
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        if let Frame::Ping(payload) = &frame {
            self.shared.answer_ping(payload.clone());
        }
        self.shared.record(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.shared.close_count.fetch_add(1, Ordering::SeqCst);
        self.shared.closed.send_replace(true);
        Ok(())
    }
}

/// The remote end of a [`MockConnection`].
#[derive(Clone)]
pub struct MockRemote {
    shared: Arc<Shared>,
}

impl MockRemote {
    /// Deliver a frame to the peer.
    pub fn send_frame(&self, frame: Frame) { let _ = self.shared.incoming.send(Ok(frame)); }

    /// Deliver `message` encoded with [`TestCodec`].
    pub fn send_message(&self, message: &TestMessage) {
        self.send_frame(Frame::text(TestCodec::payload(message)));
    }

    /// Deliver a close frame.
    pub fn send_close(&self, reason: &str) {
        self.send_frame(Frame::Close(Some(CloseReason::normal(reason))));
    }

    /// Make the peer's next read fail with `error`.
    pub fn fail_read(&self, error: ConnectionError) { let _ = self.shared.incoming.send(Err(error)); }

    /// Simulate the network dropping: reads and writes fail from now on.
    pub fn disconnect(&self) {
        self.shared.fail_writes.store(true, Ordering::SeqCst);
        self.fail_read(io::Error::from(io::ErrorKind::ConnectionReset).into());
    }

    /// Make every later write fail.
    pub fn fail_writes(&self) { self.shared.fail_writes.store(true, Ordering::SeqCst); }

    /// Hold writes until [`MockRemote::resume_writes`].
    pub fn pause_writes(&self) { self.shared.writes_paused.send_replace(true); }

    /// Release held writes.
    pub fn resume_writes(&self) { self.shared.writes_paused.send_replace(false); }

    /// Change how pings are answered.
    pub fn set_pong_policy(&self, policy: PongPolicy) {
        *self
            .shared
            .pong_policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = policy;
    }

    /// Every frame written so far, with timestamps.
    pub fn written(&self) -> Vec<Written> {
        self.shared
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Frames written so far.
    pub fn frames(&self) -> Vec<Frame> { self.written().into_iter().map(|w| w.frame).collect() }

    /// Messages written so far, decoded with [`TestCodec`].
    pub fn messages(&self) -> Vec<TestMessage> {
        use peerlink::Codec;

        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Data { payload, .. } => TestCodec.decode(&payload).ok(),
                _ => None,
            })
            .collect()
    }

    /// Pings written so far.
    pub fn pings(&self) -> usize {
        self.frames()
            .iter()
            .filter(|frame| matches!(frame, Frame::Ping(_)))
            .count()
    }

    /// Number of write calls, including ones still held or failed.
    pub fn write_attempts(&self) -> usize { *self.shared.write_attempts.borrow() }

    /// Wait until at least `n` write calls have started.
    pub async fn wait_for_write_attempts(&self, n: usize) {
        let mut rx = self.shared.write_attempts.subscribe();
        let _ = rx.wait_for(|attempts| *attempts >= n).await;
    }

    /// Wait until at least `n` data frames have been written.
    pub async fn wait_for_data(&self, n: usize) {
        let mut rx = self.shared.written_count.subscribe();
        loop {
            let data = self
                .frames()
                .iter()
                .filter(|frame| matches!(frame, Frame::Data { .. }))
                .count();
            if data >= n || rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// How many times the peer closed the connection.
    pub fn close_count(&self) -> usize { self.shared.close_count.load(Ordering::SeqCst) }

    /// Returns `true` once the peer has closed the connection.
    pub fn is_closed(&self) -> bool { *self.shared.closed.borrow() }

    /// Wait until the peer closes the connection.
    pub async fn wait_closed(&self) {
        let mut rx = self.shared.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
