//! Network provider abstraction.
//!
//! The client only needs one thing from the network: an established,
//! bidirectional byte stream to a [`ServerAddress`]. Keeping that behind a
//! trait lets tests substitute an in-memory pipe for a real socket.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::ServerAddress;

/// Provider trait for establishing stream connections.
///
/// Single-core design - no Send bounds needed.
#[async_trait(?Send)]
pub trait NetworkProvider: Clone {
    /// The stream type produced by this provider.
    type Stream: AsyncRead + AsyncWrite + Unpin + 'static;

    /// Connect to the given address.
    async fn connect(&self, address: &ServerAddress) -> io::Result<Self::Stream>;
}

/// Real Tokio networking implementation.
#[derive(Debug, Clone, Default)]
pub struct TokioNetworkProvider;

impl TokioNetworkProvider {
    /// Create a new Tokio network provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl NetworkProvider for TokioNetworkProvider {
    type Stream = TokioStream;

    async fn connect(&self, address: &ServerAddress) -> io::Result<Self::Stream> {
        match address {
            ServerAddress::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                Ok(TokioStream::Tcp(stream))
            }
            #[cfg(unix)]
            ServerAddress::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok(TokioStream::Unix(stream))
            }
            #[cfg(not(unix))]
            ServerAddress::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            )),
        }
    }
}

/// Stream produced by [`TokioNetworkProvider`].
#[derive(Debug)]
pub enum TokioStream {
    /// TCP connection.
    Tcp(tokio::net::TcpStream),
    /// Unix-domain connection.
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl AsyncRead for TokioStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TokioStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            TokioStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TokioStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            TokioStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            TokioStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TokioStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            TokioStream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TokioStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            TokioStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
