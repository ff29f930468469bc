//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The session layer doesn't care HOW messages are serialized; it holds
//! something that implements [`Codec`] and calls it. Framing (where one
//! message ends and the next begins) is a separate concern, handled in
//! [`framing`](crate::framing).
//!
//! Currently we provide [`JsonCodec`], which speaks the server's JSON
//! envelope format.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Message, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → the writer and the read loop run on different Tokio
///   tasks (possibly different threads) and share one codec.
/// - `'static` → the codec owns everything it needs, so it can live
///   inside long-running tasks.
///
/// ## Generic methods
///
/// `encode<T: Serialize>` and `decode<T: DeserializeOwned>` work for any
/// serde type. [`decode_message`](Self::decode_message) is the entry point
/// the read loop uses; codecs that can tell "unknown kind" apart from
/// "malformed" should override it.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes one complete envelope into a [`Message`].
    fn decode_message(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        self.decode(data)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use parley_protocol::{Codec, JsonCodec, Message};
///
/// let codec = JsonCodec;
/// let msg = Message::login("alice");
///
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(codec.decode_message(&bytes).unwrap(), msg);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    /// Parses to a `serde_json::Value` first so an unrecognized `kind`
    /// is reported as [`ProtocolError::UnknownKind`] rather than a generic
    /// decode failure.
    fn decode_message(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(ProtocolError::Decode)?;

        let Some(tag) = value.get("kind").and_then(|k| k.as_str()) else {
            return Err(ProtocolError::InvalidMessage(
                "envelope has no string \"kind\" field".into(),
            ));
        };
        if crate::MessageKind::from_tag(tag).is_none() {
            return Err(ProtocolError::UnknownKind(tag.to_string()));
        }

        serde_json::from_value(value).map_err(ProtocolError::Decode)
    }
}
