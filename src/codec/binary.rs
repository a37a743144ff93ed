//! `bincode` codec carried in binary frames.

use std::marker::PhantomData;

use ::bincode::{BorrowDecode, Encode, borrow_decode_from_slice, config, encode_to_vec};
use bytes::Bytes;

use super::Codec;
use crate::error::CodecError;

/// Encodes messages with `bincode`'s standard configuration.
///
/// Trailing bytes after a decoded message are rejected so a truncated or
/// concatenated payload is not silently accepted.
pub struct BincodeCodec<M>(PhantomData<fn() -> M>);

impl<M> BincodeCodec<M> {
    /// Create a new `bincode` codec.
    #[must_use]
    pub fn new() -> Self { Self(PhantomData) }
}

impl<M> Default for BincodeCodec<M> {
    fn default() -> Self { Self::new() }
}

impl<M> Clone for BincodeCodec<M> {
    fn clone(&self) -> Self { Self::new() }
}

impl<M> std::fmt::Debug for BincodeCodec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BincodeCodec")
    }
}

impl<M> Codec<M> for BincodeCodec<M>
where
    M: Encode + for<'de> BorrowDecode<'de, ()> + 'static,
{
    fn encode(&self, message: &M) -> Result<Bytes, CodecError> {
        encode_to_vec(message, config::standard())
            .map(Bytes::from)
            .map_err(CodecError::encode)
    }

    fn decode(&self, payload: &[u8]) -> Result<M, CodecError> {
        let (message, consumed) =
            borrow_decode_from_slice::<M, _>(payload, config::standard())
                .map_err(CodecError::decode)?;
        if consumed != payload.len() {
            return Err(CodecError::decode(format!(
                "{} trailing bytes after message",
                payload.len() - consumed
            )));
        }
        Ok(message)
    }
}
