//! Pluggable value serialization.
//!
//! The client treats payload encoding as an opaque collaborator: it hands a
//! [`Value`] to a [`ValueCodec`] on the way out and asks it to rebuild one
//! from reply bytes on the way in. [`JsonCodec`] is provided for getting
//! started and for debugging (human-readable frames).
//!
//! # Example
//!
//! ```rust
//! use reqlink_core::{JsonCodec, Value, ValueCodec};
//!
//! let codec = JsonCodec;
//! let value = Value::list([Value::from("ping")]);
//!
//! let bytes = codec.encode(&value).expect("encode");
//! let decoded = codec.decode(&bytes).expect("decode");
//! assert_eq!(value, decoded);
//! ```

use crate::Value;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value to bytes.
    #[error("encode error: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a value.
    #[error("decode error: {0}")]
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

/// Serialization format for request and reply payloads.
///
/// Implementations must be deterministic and stateless: the client clones
/// the codec into its connection task and calls it from there.
pub trait ValueCodec: Clone + 'static {
    /// Encode a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if the value cannot be represented.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if the bytes are malformed.
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
