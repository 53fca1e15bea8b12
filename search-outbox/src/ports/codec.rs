use crate::error::CodecError;

/// Turns an operation sequence into a queue payload and back.
///
/// Implementations must round-trip: `decode(encode(x)) == x` for every
/// sequence the indexing side can produce.
pub trait WorkCodec<Op>: Send + Sync {
    fn encode(&self, operations: &[Op]) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, payload: &[u8]) -> Result<Vec<Op>, CodecError>;
}
