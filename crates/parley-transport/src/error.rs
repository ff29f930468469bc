//! Error types for the transport layer.
//!
//! Three enums, one per phase of a connection's life:
//!
//! - [`AddressError`] — the user typed something that isn't a usable
//!   `host:port`. Raised before any socket exists.
//! - [`ConnectError`] — we had a valid address but could not open a
//!   connection to it.
//! - [`TransportError`] — the connection was open and an I/O operation
//!   on it failed.

use std::time::Duration;

/// The server address could not be parsed or resolved.
///
/// These are validation errors: they are reported back to whoever typed
/// the address, and no connection attempt is made.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    /// The host part was empty (e.g. `":8989"`).
    #[error("server host cannot be empty")]
    EmptyHost,

    /// The port part was not a number.
    #[error("server port is not a number: {0:?}")]
    InvalidPort(String),

    /// The port was a number, but not in `1..=65535`.
    #[error("server port {0} is out of range (1-65535)")]
    PortOutOfRange(u64),

    /// DNS resolution failed or returned no addresses.
    #[error("server {host} could not be resolved: {source}")]
    Unresolvable {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Opening a connection failed.
///
/// Returned by [`connect`](crate::connect) before any session state is
/// created, so the caller can simply show it and let the user try again.
/// Nothing here is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Every resolved address refused or failed the connection.
    #[error("server {address} is unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Resolution plus connection did not finish within the timeout.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// The host name could not be resolved.
    #[error(transparent)]
    Resolution(#[from] AddressError),
}

/// Errors on an established connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A send or receive did not complete within its configured timeout.
    #[error("{0} timed out after {1:?}")]
    TimedOut(&'static str, Duration),

    /// Shutting the connection down failed.
    #[error("close failed: {0}")]
    CloseFailed(#[source] std::io::Error),
}
