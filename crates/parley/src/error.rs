//! Unified error type for Parley.

use parley_protocol::ProtocolError;
use parley_session::SessionError;
use parley_transport::{AddressError, ConnectError, TransportError};

/// Top-level error that wraps all crate-specific errors.
///
/// With the `parley` facade you deal with this single error type instead
/// of importing errors from each sub-crate. `#[from]` on each variant lets
/// `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A server address could not be parsed or resolved.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The connection could not be opened.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A stream-level failure (send, receive, close).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bytes that are not a valid message or frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ParleyError {
    /// `true` if the session this came from can no longer be used.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Session(e) => e.is_fatal(),
            Self::Protocol(e) => !e.is_recoverable(),
            Self::Transport(_) => true,
            Self::Address(_) | Self::Connect(_) => false,
        }
    }
}
