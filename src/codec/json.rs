//! JSON codec carried in text frames.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use super::Codec;
use crate::{error::CodecError, frame::PayloadKind};

/// Encodes messages as JSON text.
pub struct JsonCodec<M>(PhantomData<fn() -> M>);

impl<M> JsonCodec<M> {
    /// Create a new JSON codec.
    #[must_use]
    pub fn new() -> Self { Self(PhantomData) }
}

impl<M> Default for JsonCodec<M> {
    fn default() -> Self { Self::new() }
}

impl<M> Clone for JsonCodec<M> {
    fn clone(&self) -> Self { Self::new() }
}

impl<M> std::fmt::Debug for JsonCodec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<M> Codec<M> for JsonCodec<M>
where
    M: Serialize + DeserializeOwned + 'static,
{
    fn encode(&self, message: &M) -> Result<Bytes, CodecError> {
        serde_json::to_vec(message)
            .map(Bytes::from)
            .map_err(CodecError::encode)
    }

    fn decode(&self, payload: &[u8]) -> Result<M, CodecError> {
        serde_json::from_slice(payload).map_err(CodecError::decode)
    }

    fn payload_kind(&self) -> PayloadKind { PayloadKind::Text }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    enum Wire {
        Hello { realm: String },
        Goodbye,
    }

    #[test]
    fn encodes_as_text_json() {
        let codec = JsonCodec::<Wire>::new();
        let bytes = codec
            .encode(&Wire::Hello {
                realm: "realm1".into(),
            })
            .expect("encode failed");
        assert_eq!(&bytes[..], br#"{"type":"Hello","realm":"realm1"}"#);
        assert_eq!(codec.payload_kind(), PayloadKind::Text);
    }

    #[test]
    fn rejects_malformed_payload() {
        let codec = JsonCodec::<Wire>::new();
        let err = codec.decode(b"{\"type\":").expect_err("decode should fail");
        assert!(matches!(err, CodecError::Decode(_)));
        assert_eq!(codec.decode(br#"{"type":"Goodbye"}"#).ok(), Some(Wire::Goodbye));
    }
}
