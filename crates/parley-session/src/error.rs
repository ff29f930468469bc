//! Error types for the session layer.

use parley_protocol::ProtocolError;
use parley_transport::{AddressError, ConnectError};

/// Errors returned by [`ChatSession`](crate::ChatSession) operations.
///
/// Only errors the *caller* can act on are returned. Failures that happen
/// in the background (remote disconnect, a failed presence poll) reach the
/// UI as a [`SessionEvent::ConnectionError`](crate::SessionEvent) instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The username was empty. Checked before any connection is opened.
    #[error("user name cannot be empty")]
    InvalidUsername,

    /// The server address was not valid.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The connection could not be opened. The session never started.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The message could not be encoded or framed. Nothing was written,
    /// so the connection is still usable.
    #[error("message not sent: {0}")]
    Encode(#[source] ProtocolError),

    /// Writing to the transport failed. The session is broken and is
    /// being torn down.
    #[error("write failed: {0}")]
    Write(#[source] ProtocolError),

    /// The session has been disconnected (or is disconnecting).
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// `true` if this error ended (or found already ended) the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Write(_) | Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_transport::TransportError;

    #[test]
    fn test_write_errors_are_fatal() {
        let err = SessionError::Write(ProtocolError::Transport(TransportError::SendFailed(
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"),
        )));
        assert!(err.is_fatal());
        assert!(SessionError::Closed.is_fatal());
    }

    #[test]
    fn test_encode_errors_are_not_fatal() {
        let err = SessionError::Encode(ProtocolError::FrameTooLarge { len: 9, max: 8 });
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("9 bytes"));
    }

    #[test]
    fn test_address_error_converts() {
        let err: SessionError = AddressError::EmptyHost.into();
        assert!(matches!(err, SessionError::Address(_)));
    }
}
