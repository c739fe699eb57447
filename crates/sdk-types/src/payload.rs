// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The (de)serialization seam between user values and the opaque payload
//! bytes the engine journals and ships on the wire.

use bytes::Bytes;
use std::marker::PhantomData;

/// Failure raised by a user-supplied codec. Treated as retryable by the
/// engine: it terminates the invocation stream with an error and lets the
/// runtime retry.
#[derive(Debug, thiserror::Error)]
#[error("cannot (de)serialize payload: {0}")]
pub struct PayloadCodecError(#[from] anyhow::Error);

impl PayloadCodecError {
    pub fn new(source: impl Into<anyhow::Error>) -> Self {
        PayloadCodecError(source.into())
    }
}

/// Converts user values of type `T` to and from payload bytes.
pub trait PayloadCodec<T> {
    fn serialize(&self, value: &T) -> Result<Bytes, PayloadCodecError>;

    fn deserialize(&self, bytes: Bytes) -> Result<T, PayloadCodecError>;
}

/// Identity codec, for handlers working with raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBytesCodec;

impl PayloadCodec<Bytes> for RawBytesCodec {
    fn serialize(&self, value: &Bytes) -> Result<Bytes, PayloadCodecError> {
        Ok(value.clone())
    }

    fn deserialize(&self, bytes: Bytes) -> Result<Bytes, PayloadCodecError> {
        Ok(bytes)
    }
}

/// UTF-8 string codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8StringCodec;

impl PayloadCodec<String> for Utf8StringCodec {
    fn serialize(&self, value: &String) -> Result<Bytes, PayloadCodecError> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn deserialize(&self, bytes: Bytes) -> Result<String, PayloadCodecError> {
        String::from_utf8(bytes.into()).map_err(PayloadCodecError::new)
    }
}

/// JSON codec for any `serde` (de)serializable value.
#[derive(Debug)]
pub struct JsonCodec<T>(PhantomData<T>);

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        JsonCodec(PhantomData)
    }
}

impl<T> PayloadCodec<T> for JsonCodec<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Bytes, PayloadCodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(PayloadCodecError::new)
    }

    fn deserialize(&self, bytes: Bytes) -> Result<T, PayloadCodecError> {
        serde_json::from_slice(&bytes).map_err(PayloadCodecError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_rejects_invalid_bytes() {
        assert!(Utf8StringCodec
            .deserialize(Bytes::from_static(&[0xC0, 0xAF]))
            .is_err());
    }

    #[test]
    fn json_roundtrip() {
        let codec = JsonCodec::<Vec<u32>>::default();
        let bytes = codec.serialize(&vec![1, 2, 3]).unwrap();
        assert_eq!(codec.deserialize(bytes).unwrap(), vec![1, 2, 3]);
    }
}
