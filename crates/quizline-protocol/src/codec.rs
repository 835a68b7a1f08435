//! Codec trait and the newline-delimited JSON implementation.
//!
//! A codec turns a value into exactly one frame (bytes ending in `\n`)
//! and a frame back into a value. Framing itself, splitting a byte
//! stream at newlines, lives in the transport's frame reader; the codec
//! only guarantees that what it produces can be split that way.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

/// The byte that terminates every frame.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Encodes values to single-line frames and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one frame, terminator included.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one frame. A trailing terminator (and `\r`) is
    /// tolerated.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        frame: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonLineCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] writing compact JSON followed by `\n`.
///
/// Before encoding, every string in the value (object keys included) has
/// its `\r` and `\n` characters stripped, so a player name typed with a
/// line break arrives without it rather than as an escaped newline that
/// some other reader could mistake for a frame boundary.
///
/// ```rust
/// use quizline_protocol::{Codec, Envelope, JsonLineCodec};
///
/// let codec = JsonLineCodec;
/// let bytes = codec.encode(&Envelope::answer("Alice", 1)).unwrap();
/// assert_eq!(bytes.last(), Some(&b'\n'));
///
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Envelope::answer("Alice", 1));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLineCodec;

impl Codec for JsonLineCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut value =
            serde_json::to_value(value).map_err(ProtocolError::Encode)?;
        strip_newlines(&mut value);

        let mut bytes =
            serde_json::to_vec(&value).map_err(ProtocolError::Encode)?;
        if bytes.contains(&FRAME_TERMINATOR) {
            return Err(ProtocolError::InvalidMessage(
                "encoded frame contains a raw newline".into(),
            ));
        }
        bytes.push(FRAME_TERMINATOR);
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        frame: &[u8],
    ) -> Result<T, ProtocolError> {
        let frame = frame.strip_suffix(b"\n").unwrap_or(frame);
        let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}

fn strip_newlines(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains(['\n', '\r']) {
                s.retain(|c| c != '\n' && c != '\r');
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_newlines),
        Value::Object(map) => {
            let entries = std::mem::take(map);
            *map = entries
                .into_iter()
                .map(|(mut key, mut v)| {
                    key.retain(|c| c != '\n' && c != '\r');
                    strip_newlines(&mut v);
                    (key, v)
                })
                .collect::<Map<String, Value>>();
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
