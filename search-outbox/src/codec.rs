//! JSON work codec.

use std::fmt;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;
use crate::ports::WorkCodec;

/// Encodes operation sequences as a JSON array.
pub struct JsonCodec<Op> {
    _marker: PhantomData<fn() -> Op>,
}

impl<Op> JsonCodec<Op> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Op> Default for JsonCodec<Op> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Op> Clone for JsonCodec<Op> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Op> fmt::Debug for JsonCodec<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec").finish()
    }
}

impl<Op> WorkCodec<Op> for JsonCodec<Op>
where
    Op: Serialize + DeserializeOwned,
{
    fn encode(&self, operations: &[Op]) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(operations).map_err(CodecError::Encode)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<Op>, CodecError> {
        serde_json::from_slice(payload).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentOperation;
    use serde_json::json;

    #[test]
    fn round_trips_every_operation_kind() {
        let codec = JsonCodec::<DocumentOperation>::new();
        let operations = vec![
            DocumentOperation::add("1", json!({"title": "Rust", "tags": ["a", "b"]})),
            DocumentOperation::update("2", json!({"title": "Updated", "price": 10.5})),
            DocumentOperation::delete("3"),
            DocumentOperation::PurgeAll,
            DocumentOperation::Optimize,
            DocumentOperation::Flush,
        ];

        let payload = codec.encode(&operations).unwrap();
        let decoded = codec.decode(&payload).unwrap();

        assert_eq!(decoded, operations);
    }

    #[test]
    fn round_trips_empty_sequence() {
        let codec = JsonCodec::<DocumentOperation>::new();
        let payload = codec.encode(&[]).unwrap();
        assert!(codec.decode(&payload).unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = JsonCodec::<DocumentOperation>::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
