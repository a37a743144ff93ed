//! Tests for the outbound pump.
//!
//! They cover FIFO delivery to the connection, per-message encode failures
//! and the session ending when a write fails.

use log::Level;
use peerlink::{Frame, PeerConfig, SendError};
use peerlink_testing::{LoggerHandle, TestCodec, TestMessage, logger, send_expect, spawn_peer};
use proptest::prelude::*;
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[tokio::test]
async fn messages_are_written_in_send_order() {
    let (peer, remote) = spawn_peer(PeerConfig::default());
    for n in 0..10 {
        send_expect!(peer.send(TestMessage::numbered(n)));
    }
    remote.wait_for_data(10).await;

    let expected: Vec<_> = (0..10).map(TestMessage::numbered).collect();
    assert_eq!(remote.messages(), expected);
    peer.close().await;
}

#[rstest]
#[tokio::test]
async fn each_producer_keeps_its_own_order() {
    let (peer, remote) = spawn_peer(PeerConfig::default());
    let producers: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| {
            let handle = peer.handle();
            tokio::spawn(async move {
                for n in 0..5 {
                    send_expect!(handle.send(TestMessage::text(format!("{name}{n}"))));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.expect("producer panicked");
    }
    peer.close().await;

    let written = remote.messages();
    assert_eq!(written.len(), 15);
    for name in ["a", "b", "c"] {
        let own: Vec<_> = written
            .iter()
            .filter_map(|m| match m {
                TestMessage::Text(body) if body.starts_with(name) => Some(body.clone()),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = (0..5).map(|n| format!("{name}{n}")).collect();
        assert_eq!(own, expected, "producer {name} reordered");
    }
}

#[rstest]
#[tokio::test]
async fn unencodable_message_is_skipped() {
    let (peer, remote) = spawn_peer(PeerConfig::default());
    send_expect!(peer.send(TestMessage::numbered(0)));
    send_expect!(peer.send(TestMessage::Unencodable));
    send_expect!(peer.send(TestMessage::numbered(1)));
    remote.wait_for_data(2).await;

    assert_eq!(
        remote.messages(),
        vec![TestMessage::numbered(0), TestMessage::numbered(1)]
    );
    assert!(!peer.is_closed());
    peer.close().await;
}

#[rstest]
#[tokio::test]
async fn data_frames_use_codec_payload_kind() {
    let (peer, remote) = spawn_peer(PeerConfig::default());
    let message = TestMessage::text("hello");
    send_expect!(peer.send(message.clone()));
    remote.wait_for_data(1).await;

    assert_eq!(remote.frames()[0], Frame::text(TestCodec::payload(&message)));
    peer.close().await;
}

#[rstest]
#[tokio::test]
#[serial]
async fn write_failure_ends_session() {
    let (mut peer, remote) = spawn_peer(PeerConfig::default());
    remote.fail_writes();
    send_expect!(peer.send(TestMessage::numbered(0)));

    assert_eq!(peer.recv().await, None, "inbound stream should end");
    remote.wait_closed().await;
    assert!(peer.is_closed());
    assert_eq!(
        peer.send(TestMessage::numbered(1)).await,
        Err(SendError::Closed)
    );
    peer.close().await;
    assert_eq!(remote.close_count(), 1);
}

#[rstest]
#[tokio::test]
#[serial]
async fn failed_close_ack_is_not_reported_as_warning(mut logger: LoggerHandle) {
    let (mut peer, remote) = spawn_peer(PeerConfig::default());
    remote.fail_writes();
    send_expect!(peer.send(TestMessage::GoodbyeAck));
    assert_eq!(peer.recv().await, None);
    peer.close().await;

    let mut saw_debug = false;
    while let Some(record) = logger.pop() {
        assert!(
            !(record.level() == Level::Warn && record.args().starts_with("write failed")),
            "unexpected warning: {}",
            record.args()
        );
        saw_debug |= record.args().contains("session close acknowledgement failed");
    }
    assert!(saw_debug, "expected debug log for failed acknowledgement");
}

#[rstest]
#[tokio::test]
#[serial]
async fn failed_write_is_logged_as_warning(mut logger: LoggerHandle) {
    let (mut peer, remote) = spawn_peer(PeerConfig::default());
    remote.fail_writes();
    send_expect!(peer.send(TestMessage::numbered(0)));
    assert_eq!(peer.recv().await, None);
    peer.close().await;

    let mut found = false;
    while let Some(record) = logger.pop() {
        found |= record.level() == Level::Warn && record.args().starts_with("write failed");
    }
    assert!(found, "write failure warning not logged");
}

fn written_in_order(bodies: &[String]) -> Vec<TestMessage> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let (peer, remote) = spawn_peer(PeerConfig::default());
        for body in bodies {
            send_expect!(peer.send(TestMessage::text(body.clone())));
        }
        peer.close().await;
        remote.messages()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn arbitrary_batches_arrive_in_order(bodies in prop::collection::vec("[a-z0-9]{0,12}", 0..40)) {
        let written = written_in_order(&bodies);
        let expected: Vec<_> = bodies.into_iter().map(TestMessage::Text).collect();
        prop_assert_eq!(written, expected);
    }
}
