//! End-to-end sessions between two peers over an in-memory WebSocket.

use std::time::Duration;

use peerlink::{
    BincodeCodec,
    Codec,
    JsonCodec,
    Message,
    Peer,
    PeerConfig,
    WebSocketConnection,
};
use peerlink_testing::{recv_expect, send_expect};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use tokio::io::{DuplexStream, duplex};
use tokio_tungstenite::{WebSocketStream, accept_async, client_async};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
enum Chat {
    Say { from: String, body: String },
    Goodbye,
}

impl Message for Chat {
    fn is_session_close_ack(&self) -> bool { matches!(self, Chat::Goodbye) }
}

fn say(from: &str, body: &str) -> Chat {
    Chat::Say {
        from: from.to_owned(),
        body: body.to_owned(),
    }
}

async fn websocket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (client_io, server_io) = duplex(64 * 1024);
    let (client, server) = tokio::join!(
        client_async("ws://localhost/chat", client_io),
        accept_async(server_io)
    );
    let (client, _response) = client.expect("client handshake");
    (client, server.expect("server handshake"))
}

async fn peer_pair<C>(codec: C) -> (Peer<Chat>, Peer<Chat>)
where
    C: Codec<Chat> + Clone,
{
    let (client, server) = websocket_pair().await;
    (
        Peer::new(
            WebSocketConnection::new(client),
            codec.clone(),
            PeerConfig::default(),
        ),
        Peer::new(WebSocketConnection::from(server), codec, PeerConfig::default()),
    )
}

#[rstest]
#[tokio::test]
async fn json_messages_flow_both_ways() {
    let (mut client, mut server) = peer_pair(JsonCodec::<Chat>::new()).await;

    send_expect!(client.send(say("client", "hello")));
    assert_eq!(recv_expect!(server.recv()), say("client", "hello"));

    send_expect!(server.send(say("server", "welcome")));
    assert_eq!(recv_expect!(client.recv()), say("server", "welcome"));

    client.close().await;
    assert_eq!(server.recv().await, None, "close frame ends the remote stream");
    server.close().await;
}

#[rstest]
#[tokio::test]
async fn bincode_messages_keep_order() {
    let (client, mut server) = peer_pair(BincodeCodec::<Chat>::new()).await;

    for n in 0..20 {
        send_expect!(client.send(say("client", &n.to_string())));
    }
    client.close().await;

    for n in 0..20 {
        assert_eq!(recv_expect!(server.recv()), say("client", &n.to_string()));
    }
    assert_eq!(server.recv().await, None);
    server.close().await;
}

#[rstest]
#[tokio::test]
async fn keepalive_is_answered_by_remote_websocket() {
    let (client, server) = websocket_pair().await;
    let config = PeerConfig::builder()
        .keepalive(Duration::from_millis(1000))
        .build()
        .expect("valid config");
    let client: Peer<Chat> = Peer::new(WebSocketConnection::new(client), JsonCodec::new(), config);
    let mut server: Peer<Chat> =
        Peer::new(WebSocketConnection::new(server), JsonCodec::new(), PeerConfig::default());

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(!client.is_closed(), "answered pings keep the session open");

    send_expect!(client.send(Chat::Goodbye));
    assert_eq!(recv_expect!(server.recv()), Chat::Goodbye);
    client.close().await;
    server.close().await;
}
