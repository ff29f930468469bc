//! Transport layer for Parley.
//!
//! Gets a chat client from "the user typed `localhost:8989`" to "we hold
//! an open TCP stream":
//!
//! - [`ServerAddress`] — parses and validates `host:port`
//! - [`connect`] — resolves and connects under a timeout
//! - [`TcpConnection`] — the resulting stream, tagged with a [`ConnectionId`]
//!
//! Framing and message encoding live one layer up, in `parley-protocol`.

mod address;
mod error;
mod tcp;

pub use address::{DEFAULT_PORT, ServerAddress};
pub use error::{AddressError, ConnectError, TransportError};
pub use tcp::{TcpConnection, connect};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
