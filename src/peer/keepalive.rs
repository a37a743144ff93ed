//! Ping/pong liveness monitoring for the outbound pump.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::connection::PongHandler;

/// Consecutive unanswered pings after which the connection is closed.
pub const MAX_MISSED_PONGS: u32 = 2;

/// Count of keepalive ticks since the last pong.
///
/// Written by the outbound pump on each ping and reset by the pong handler,
/// which runs inside the inbound pump's reads.
#[derive(Clone, Debug, Default)]
pub(super) struct MissedPongs(Arc<AtomicU32>);

impl MissedPongs {
    pub(super) fn count(&self) -> u32 { self.0.load(Ordering::Acquire) }

    pub(super) fn record_ping(&self) { self.0.fetch_add(1, Ordering::AcqRel); }

    pub(super) fn reset(&self) { self.0.store(0, Ordering::Release); }

    /// Handler resetting the counter on any pong.
    pub(super) fn pong_handler(&self) -> PongHandler {
        let missed = self.clone();
        Arc::new(move |_payload| missed.reset())
    }
}

/// Outcome of a keepalive tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Tick {
    /// The remote is still considered alive; send another ping.
    Ping,
    /// Too many pings went unanswered.
    Expired,
}

/// Periodic timer plus missed-pong accounting.
pub(super) struct Keepalive {
    interval: Interval,
    period: Duration,
    missed: MissedPongs,
}

impl Keepalive {
    /// Create a monitor whose first tick fires one `period` from now.
    pub(super) fn new(period: Duration, missed: MissedPongs) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            period,
            missed,
        }
    }

    pub(super) fn period(&self) -> Duration { self.period }

    pub(super) fn missed(&self) -> u32 { self.missed.count() }

    /// Wait for the next tick and decide whether the remote is still alive.
    pub(super) async fn tick(&mut self) -> Tick {
        self.interval.tick().await;
        if self.missed.count() >= MAX_MISSED_PONGS {
            Tick::Expired
        } else {
            Tick::Ping
        }
    }

    /// Record that a ping was written.
    pub(super) fn ping_sent(&self) { self.missed.record_ping(); }
}
