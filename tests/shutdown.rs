//! Tests for local and remote session teardown.
//!
//! They verify the drain-before-close-frame ordering, single connection
//! close, abrupt disconnect handling and the delivery grace period.

use std::{io, time::Duration};

use peerlink::{CloseReason, ConnectionError, Frame, PeerConfig, SendError};
use peerlink_testing::{TestMessage, recv_expect, send_expect, spawn_peer};
use rstest::{fixture, rstest};
use tokio::time::Instant;

const GRACE: Duration = Duration::from_secs(1);

#[fixture]
fn config() -> PeerConfig {
    PeerConfig::builder()
        .delivery_grace(GRACE)
        .build()
        .expect("valid config")
}

fn goodbye() -> Frame { Frame::Close(Some(CloseReason::normal("goodbye"))) }

#[rstest]
#[tokio::test]
async fn close_drains_queue_before_close_frame(config: PeerConfig) {
    let (peer, remote) = spawn_peer(config);
    for n in 0..5 {
        send_expect!(peer.send(TestMessage::numbered(n)));
    }
    peer.close().await;

    let frames = remote.frames();
    assert_eq!(frames.len(), 6, "five messages then the close frame: {frames:?}");
    assert_eq!(
        remote.messages(),
        (0..5).map(TestMessage::numbered).collect::<Vec<_>>()
    );
    assert_eq!(frames[5], goodbye());
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test]
async fn close_frame_waits_for_outbound_pump(config: PeerConfig) {
    let (peer, remote) = spawn_peer(config);
    remote.pause_writes();
    for n in 0..3 {
        send_expect!(peer.send(TestMessage::numbered(n)));
    }
    remote.wait_for_write_attempts(1).await;

    let closing = tokio::spawn(peer.close());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!closing.is_finished(), "close must wait for queued writes");
    assert!(remote.frames().is_empty());
    assert!(!remote.is_closed());

    remote.resume_writes();
    closing.await.expect("close panicked");
    let frames = remote.frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames.last(), Some(&goodbye()));
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test]
async fn sends_after_close_are_rejected(config: PeerConfig) {
    let (peer, remote) = spawn_peer(config);
    let handle = peer.handle();
    peer.close().await;

    assert!(handle.is_closed());
    assert_eq!(handle.send(TestMessage::numbered(0)).await, Err(SendError::Closed));
    assert_eq!(
        handle.try_send(TestMessage::numbered(1)).await,
        Err(SendError::Closed)
    );
    assert_eq!(remote.frames(), vec![goodbye()]);
}

#[rstest]
#[tokio::test]
async fn abrupt_disconnect_drains_queued_messages(config: PeerConfig) {
    let (mut peer, remote) = spawn_peer(config);
    remote.pause_writes();
    for n in 0..3 {
        send_expect!(peer.send(TestMessage::numbered(n)));
    }
    remote.wait_for_write_attempts(1).await;
    remote.fail_read(io::Error::from(io::ErrorKind::ConnectionReset).into());
    remote.resume_writes();

    assert_eq!(peer.recv().await, None, "stream ends after a read error");
    assert_eq!(
        remote.messages(),
        (0..3).map(TestMessage::numbered).collect::<Vec<_>>(),
        "queued messages are written before the session ends"
    );

    remote.wait_closed().await;
    assert!(!remote.frames().iter().any(Frame::is_close));
    peer.close().await;
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test]
async fn disconnect_with_failing_writes_does_not_deadlock(config: PeerConfig) {
    let (mut peer, remote) = spawn_peer(config);
    for n in 0..3 {
        send_expect!(peer.send(TestMessage::numbered(n)));
    }
    remote.disconnect();

    tokio::time::timeout(Duration::from_secs(5), async {
        assert_eq!(peer.recv().await, None);
        peer.close().await;
    })
    .await
    .expect("teardown should not hang");
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test]
async fn remote_close_racing_local_close_closes_once(config: PeerConfig) {
    let (peer, remote) = spawn_peer(config);
    remote.send_close("bye");
    remote.fail_read(ConnectionError::Closed);
    peer.close().await;
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stalled_consumer_delays_close_by_grace_only(config: PeerConfig) {
    let (mut peer, remote) = spawn_peer(config);
    let mut inbound = peer.take_inbound().expect("stream not yet taken");
    for n in 0..3 {
        remote.send_message(&TestMessage::numbered(n));
    }
    // Let the inbound pump block on the full stream.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let start = Instant::now();
    peer.close().await;
    let elapsed = start.elapsed();
    assert!(elapsed >= GRACE, "close returned before the grace period: {elapsed:?}");
    assert!(elapsed < GRACE * 2, "close overran the grace period: {elapsed:?}");

    assert_eq!(recv_expect!(inbound.recv()), TestMessage::numbered(0));
    assert_eq!(inbound.recv().await, None, "blocked delivery is abandoned");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn last_message_is_delivered_within_grace(config: PeerConfig) {
    let (mut peer, remote) = spawn_peer(config);
    let mut inbound = peer.take_inbound().expect("stream not yet taken");
    remote.send_message(&TestMessage::numbered(0));
    remote.send_message(&TestMessage::numbered(1));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let consumer = tokio::spawn(async move {
        tokio::time::sleep(GRACE / 2).await;
        let mut received = Vec::new();
        while let Some(message) = inbound.recv().await {
            received.push(message);
        }
        received
    });
    peer.close().await;

    let received = consumer.await.expect("consumer panicked");
    assert_eq!(received, vec![TestMessage::numbered(0), TestMessage::numbered(1)]);
}

#[rstest]
#[tokio::test]
async fn dropping_inbound_lets_close_finish(config: PeerConfig) {
    let (peer, remote) = spawn_peer(config);
    remote.send_message(&TestMessage::numbered(0));
    remote.send_message(&TestMessage::numbered(1));
    remote.send_message(&TestMessage::numbered(2));

    tokio::time::timeout(Duration::from_secs(5), peer.close())
        .await
        .expect("close should not wait for an unread stream");
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test]
async fn dropped_stream_does_not_end_session(config: PeerConfig) {
    let (mut peer, remote) = spawn_peer(config);
    drop(peer.take_inbound());
    remote.pause_writes();
    for n in 0..3 {
        send_expect!(peer.send(TestMessage::numbered(n)));
    }
    remote.wait_for_write_attempts(1).await;

    remote.send_message(&TestMessage::numbered(99));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!peer.is_closed(), "unread inbound message must not end the session");

    remote.resume_writes();
    peer.close().await;
    assert_eq!(
        remote.messages(),
        (0..3).map(TestMessage::numbered).collect::<Vec<_>>()
    );
    assert_eq!(remote.frames().last(), Some(&goodbye()));
    assert_eq!(remote.close_count(), 1);
}
