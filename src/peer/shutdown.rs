//! Local shutdown sequence run by [`Peer::close`](super::Peer::close).

use log::debug;
use tokio_util::task::TaskTracker;

use super::{Inbound, PeerHandle, PeerId, signals::Signals};
use crate::message::Message;

/// Everything the coordinator needs from a peer being closed.
pub(super) struct Closing<M> {
    pub(super) id: PeerId,
    pub(super) handle: PeerHandle<M>,
    pub(super) inbound: Option<Inbound<M>>,
    pub(super) signals: Signals,
    pub(super) tasks: TaskTracker,
}

impl<M: Message> Closing<M> {
    /// Drain, signal and close.
    ///
    /// 1. Queue the sentinel behind pending messages and wait for the outbound pump to exit.
    /// 2. Raise `explicit_close`. The outbound pump then sends the close frame and closes the
    ///    connection; this ordering keeps the close frame behind every drained message.
    /// 3. Wait for the connection to close and both pumps to finish.
    pub(super) async fn run(self) {
        let Self {
            id,
            handle,
            inbound,
            signals,
            tasks,
        } = self;

        if !handle.request_shutdown().await {
            debug!("outbound pump already stopped: id={id}");
        }
        signals.writer_done.cancelled().await;
        signals.explicit_close.cancel();
        drop(handle);

        // A stream still held here has no reader; let the inbound pump go.
        drop(inbound);

        signals.conn_closed.cancelled().await;
        tasks.wait().await;
        debug!("peer shutdown complete: id={id}");
    }
}
