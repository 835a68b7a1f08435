//! Error types for the protocol layer.
//!
//! Every variant here is local and non-fatal: a frame that fails to
//! encode or decode is dropped by the caller, and the connection it came
//! from stays open.

use crate::MessageType;

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into a frame).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: the frame is not valid JSON, has an unknown
    /// `type`, or is missing a required envelope field.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope parsed, but its `data` map does not match the shape
    /// required by its `type` (e.g. an `answer` without an index).
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },

    /// The message is invalid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
