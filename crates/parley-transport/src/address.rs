//! Parsing and resolving the `host:port` string a user types in.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::AddressError;

/// The port a Parley server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8989;

/// A validated chat server address.
///
/// Construction guarantees a non-empty host and a port in `1..=65535`.
/// It does NOT guarantee the host resolves; call [`resolve`](Self::resolve)
/// for that.
///
/// ```rust
/// use parley_transport::ServerAddress;
///
/// let addr: ServerAddress = "localhost:9000".parse().unwrap();
/// assert_eq!(addr.host(), "localhost");
/// assert_eq!(addr.port(), 9000);
///
/// // No port: the default is used.
/// let addr = ServerAddress::parse("chat.example.org").unwrap();
/// assert_eq!(addr.port(), parley_transport::DEFAULT_PORT);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Builds an address from its parts.
    ///
    /// # Errors
    /// [`AddressError::EmptyHost`] if `host` is blank,
    /// [`AddressError::PortOutOfRange`] if `port` is 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, AddressError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(AddressError::EmptyHost);
        }
        if port == 0 {
            return Err(AddressError::PortOutOfRange(0));
        }
        Ok(Self { host, port })
    }

    /// Parses `"host:port"`, splitting on the FIRST `:`.
    ///
    /// A string without any `:` is taken as a bare host on
    /// [`DEFAULT_PORT`]. Because the split is on the first colon,
    /// bracket-less IPv6 literals are not accepted; use
    /// [`new`](Self::new) for those.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        let Some((host, port)) = input.split_once(':') else {
            return Self::new(input, DEFAULT_PORT);
        };

        // Parse wider than u16 so "70000" reports "out of range"
        // rather than "not a number".
        let port: u64 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;
        let port = u16::try_from(port)
            .map_err(|_| AddressError::PortOutOfRange(port))?;

        Self::new(host, port)
    }

    /// The host name or IP literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the host via DNS.
    ///
    /// # Errors
    /// [`AddressError::Unresolvable`] if the lookup fails or yields no
    /// addresses.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>, AddressError> {
        let addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((self.host.as_str(), self.port))
                .await
                .map_err(|source| AddressError::Unresolvable {
                    host: self.host.clone(),
                    source,
                })?
                .collect();

        if addrs.is_empty() {
            return Err(AddressError::Unresolvable {
                host: self.host.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses returned",
                ),
            });
        }
        tracing::trace!(address = %self, count = addrs.len(), "resolved");
        Ok(addrs)
    }
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
