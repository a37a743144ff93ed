//! Utilities for driving a [`Peer`](peerlink::Peer) against an in-memory
//! connection during tests.
//!
//! [`mock_connection`] returns a connection for the peer and a
//! [`MockRemote`] that plays the other end: it injects frames and read
//! errors, records everything the peer writes and answers pings according
//! to a [`PongPolicy`].
//!
//! ```rust
//! use peerlink::{Peer, PeerConfig};
//! use peerlink_testing::{TestCodec, TestMessage, mock_connection};
//!
//! # async fn example() {
//! let (conn, remote) = mock_connection();
//! let peer = Peer::new(conn, TestCodec, PeerConfig::default());
//! peer.send(TestMessage::text("hello")).await.unwrap();
//! remote.wait_for_data(1).await;
//! peer.close().await;
//! # }
//! ```

pub mod logging;
pub mod macros;
pub mod message;
pub mod mock;

pub use logging::{LoggerHandle, logger};
pub use message::{TestCodec, TestMessage};
pub use mock::{
    MockConnection,
    MockRemote,
    PongPolicy,
    Written,
    mock_connection,
    mock_connection_with,
    spawn_peer,
};
