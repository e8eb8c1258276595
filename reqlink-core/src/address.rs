//! Server addressing.
//!
//! A client connects to exactly one of two endpoint kinds: a Unix-domain
//! socket path or a TCP socket address.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Longest Unix socket path accepted, in bytes.
///
/// `sun_path` holds 108 bytes including the trailing NUL.
pub const MAX_UNIX_PATH_LEN: usize = 107;

/// Address of the request server.
///
/// # Examples
///
/// ```
/// use reqlink_core::ServerAddress;
///
/// let unix: ServerAddress = "unix:/run/daemon.sock".parse().expect("unix");
/// assert!(matches!(unix, ServerAddress::Unix(_)));
///
/// let tcp: ServerAddress = "tcp:127.0.0.1:7000".parse().expect("tcp");
/// assert_eq!(tcp.to_string(), "tcp:127.0.0.1:7000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerAddress {
    /// Unix-domain stream socket at the given path.
    Unix(PathBuf),
    /// TCP endpoint.
    Tcp(SocketAddr),
}

impl ServerAddress {
    /// Create a Unix-domain address.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        ServerAddress::Unix(path.into())
    }

    /// Create a TCP address.
    pub fn tcp(addr: SocketAddr) -> Self {
        ServerAddress::Tcp(addr)
    }

    /// Check that the address is well-formed for its kind.
    ///
    /// # Errors
    ///
    /// - `EmptyPath` / `PathTooLong` for unusable Unix paths
    /// - `InvalidPort` for TCP port 0
    pub fn validate(&self) -> Result<(), AddressParseError> {
        match self {
            ServerAddress::Unix(path) => {
                let len = path.as_os_str().len();
                if len == 0 {
                    return Err(AddressParseError::EmptyPath);
                }
                if len > MAX_UNIX_PATH_LEN {
                    return Err(AddressParseError::PathTooLong { len });
                }
                Ok(())
            }
            ServerAddress::Tcp(addr) => {
                if addr.port() == 0 {
                    return Err(AddressParseError::InvalidPort);
                }
                Ok(())
            }
        }
    }
}

impl FromStr for ServerAddress {
    type Err = AddressParseError;

    /// Parse `unix:<path>`, `tcp:<ip>:<port>` or a bare `<ip>:<port>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = if let Some(path) = s.strip_prefix("unix:") {
            ServerAddress::Unix(PathBuf::from(path))
        } else {
            let rest = s.strip_prefix("tcp:").unwrap_or(s);
            let addr: SocketAddr = rest
                .parse()
                .map_err(|_| AddressParseError::InvalidSocketAddr {
                    input: rest.to_string(),
                })?;
            ServerAddress::Tcp(addr)
        };
        address.validate()?;
        Ok(address)
    }
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerAddress::Unix(path) => write!(f, "unix:{}", path.display()),
            ServerAddress::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

/// Error parsing or validating a server address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// Unix socket path is empty.
    #[error("unix socket path is empty")]
    EmptyPath,
    /// Unix socket path does not fit in `sun_path`.
    #[error("unix socket path too long: {len} bytes (max {MAX_UNIX_PATH_LEN})")]
    PathTooLong {
        /// Length of the rejected path in bytes.
        len: usize,
    },
    /// TCP part is not an `ip:port` pair.
    #[error("invalid socket address: {input}")]
    InvalidSocketAddr {
        /// The text that failed to parse.
        input: String,
    },
    /// TCP port 0 cannot be connected to.
    #[error("invalid port number")]
    InvalidPort,
}
