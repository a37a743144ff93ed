//! Message codecs.
//!
//! A [`Codec`] turns one message into one data-frame payload and back. The
//! peer treats every codec failure as local to that message: the message is
//! logged and dropped, and the session continues.
//!
//! Two codecs are bundled:
//!
//! - [`JsonCodec`] writes UTF-8 JSON in text frames.
//! - [`BincodeCodec`] writes `bincode` standard encoding in binary frames.

use bytes::Bytes;

use crate::{error::CodecError, frame::PayloadKind};

mod binary;
mod json;

pub use binary::BincodeCodec;
pub use json::JsonCodec;

/// Serializes messages of type `M` to frame payloads and back.
pub trait Codec<M>: Send + Sync + 'static {
    /// Encode `message` into a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the message cannot be serialized.
    fn encode(&self, message: &M) -> Result<Bytes, CodecError>;

    /// Decode a frame payload into a message.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the payload is malformed.
    fn decode(&self, payload: &[u8]) -> Result<M, CodecError>;

    /// Kind of data frame the encoded payloads are written in.
    fn payload_kind(&self) -> PayloadKind { PayloadKind::Binary }
}
