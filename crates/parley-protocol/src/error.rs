//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means "these bytes are not a message we
//! understand" or "we couldn't get a whole frame off the stream". Which
//! one matters to the caller: a decode failure affects one message and
//! the connection carries on, a framing failure means the byte stream
//! can no longer be trusted.

use parley_transport::TransportError;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or fields of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed envelope whose `kind` is not one we know.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// The message is invalid at the protocol level (e.g. no `kind` at all).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A frame declared (or would need) a length above the limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The underlying stream failed or ended mid-frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// `true` if this error only spoils the current message, leaving the
    /// stream usable. Framing and transport errors are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::FrameTooLarge { .. } | Self::Transport(_))
    }
}
