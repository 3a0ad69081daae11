//! Element codecs.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Serializes one element of a gather payload.
///
/// Implementations append to `buf` on encode and advance `buf` past the
/// consumed bytes on decode.
pub trait ElementCodec {
    /// The element type carried in records.
    type Element;

    /// Append the encoding of `element` to `buf`.
    fn encode_into(&self, element: &Self::Element, buf: &mut Vec<u8>) -> Result<()>;

    /// Decode one element from the front of `buf`, advancing it.
    fn decode_from(&self, buf: &mut &[u8]) -> Result<Self::Element>;
}

/// Element codec backed by bincode for any `serde` type.
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Create a codec for `T`.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BincodeCodec<T> {}

impl<T> std::fmt::Debug for BincodeCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BincodeCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize + DeserializeOwned> ElementCodec for BincodeCodec<T> {
    type Element = T;

    fn encode_into(&self, element: &T, buf: &mut Vec<u8>) -> Result<()> {
        bincode::serialize_into(buf, element)?;
        Ok(())
    }

    fn decode_from(&self, buf: &mut &[u8]) -> Result<T> {
        Ok(bincode::deserialize_from(buf)?)
    }
}
