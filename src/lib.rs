#![doc(html_root_url = "https://docs.rs/peerlink/latest")]
//! Public API for the `peerlink` library.
//!
//! This crate runs a bidirectional message session over an established,
//! framed connection such as a WebSocket. A [`Peer`] pairs an outbound pump
//! with an inbound pump, applies bounded backpressure to producers, monitors
//! liveness with ping/pong keepalive and shuts down without losing queued
//! messages.

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod message;
pub mod metrics;
pub mod peer;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use config::{CookieJar, DialOptions, PeerConfig, PeerConfigBuilder};
pub use connection::{Connection, FrameReader, FrameWriter, PongHandler};
pub use error::{CodecError, ConnectionError, PeerConfigError, SendError};
pub use frame::{CloseReason, Frame, PayloadKind};
pub use message::{Message, Outbound};
pub use metrics::Direction;
pub use peer::{Inbound, MAX_MISSED_PONGS, Peer, PeerHandle, PeerId, active_peer_count};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
