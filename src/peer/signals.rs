//! One-shot signals shared by the pump tasks and the shutdown coordinator.

use tokio_util::sync::CancellationToken;

/// Lifecycle signals for one peer.
///
/// Each token is set at most once and observed by any number of waiters.
#[derive(Clone, Debug)]
pub(super) struct Signals {
    /// The outbound pump has left its loop and closed the queue.
    pub(super) writer_done: CancellationToken,
    /// Shutdown was requested locally through `Peer::close`.
    pub(super) explicit_close: CancellationToken,
    /// The inbound pump has exited.
    pub(super) reader_gone: CancellationToken,
    /// The connection has been closed. Pending reads are abandoned.
    pub(super) conn_closed: CancellationToken,
}

impl Signals {
    pub(super) fn new() -> Self {
        Self {
            writer_done: CancellationToken::new(),
            explicit_close: CancellationToken::new(),
            reader_gone: CancellationToken::new(),
            conn_closed: CancellationToken::new(),
        }
    }
}
