//! A small message type and text codec for tests.

use bytes::Bytes;
use peerlink::{Codec, CodecError, Message, PayloadKind};

/// Message exchanged by test peers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestMessage {
    /// Ordinary application payload.
    Text(String),
    /// Acknowledges the end of the session.
    GoodbyeAck,
    /// Always fails to encode.
    Unencodable,
}

impl TestMessage {
    /// Build a [`TestMessage::Text`].
    pub fn text(text: impl Into<String>) -> Self { Self::Text(text.into()) }

    /// Numbered message used by ordering tests.
    pub fn numbered(n: usize) -> Self { Self::Text(format!("m{n}")) }
}

impl Message for TestMessage {
    fn is_session_close_ack(&self) -> bool { matches!(self, Self::GoodbyeAck) }
}

/// Codec writing `text:<body>` or `ack` in text frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestCodec;

impl TestCodec {
    /// Payload the codec produces for `message`, for asserting on writes.
    ///
    /// # Panics
    ///
    /// Panics for [`TestMessage::Unencodable`].
    pub fn payload(message: &TestMessage) -> Bytes {
        Self.encode(message)
            .expect("test message should encode")
    }
}

impl Codec<TestMessage> for TestCodec {
    fn encode(&self, message: &TestMessage) -> Result<Bytes, CodecError> {
        match message {
            TestMessage::Text(body) => Ok(Bytes::from(format!("text:{body}"))),
            TestMessage::GoodbyeAck => Ok(Bytes::from_static(b"ack")),
            TestMessage::Unencodable => Err(CodecError::encode("message refuses to encode")),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<TestMessage, CodecError> {
        let text = std::str::from_utf8(payload).map_err(CodecError::decode)?;
        if text == "ack" {
            return Ok(TestMessage::GoodbyeAck);
        }
        text.strip_prefix("text:")
            .map(TestMessage::text)
            .ok_or_else(|| CodecError::decode(format!("unrecognised payload {text:?}")))
    }

    fn payload_kind(&self) -> PayloadKind { PayloadKind::Text }
}
