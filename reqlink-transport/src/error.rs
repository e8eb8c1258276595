//! Error types for client and request operations.

use std::io;
use std::time::Duration;

use reqlink_core::{AddressParseError, CodecError};

use crate::{RequestId, RequestState, WireError};

/// Errors surfaced by the client.
///
/// Fatal variants (see [`ClientError::is_fatal`]) are delivered once through
/// `ClientHandler::on_error` and move the client to `Failed`. The others are
/// returned synchronously from the call that caused them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The address cannot be connected to.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressParseError),

    /// The connection could not be established.
    #[error("connection to {address} failed: {message}")]
    ConnectFailed {
        /// Address that was being connected to.
        address: String,
        /// Underlying I/O error.
        message: String,
    },

    /// The connection was not established in time.
    #[error("connection timeout after {timeout:?}")]
    ConnectTimeout {
        /// Configured connect timeout.
        timeout: Duration,
    },

    /// The server closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Reading or writing the connection failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Inbound bytes are not a valid frame.
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),

    /// An inbound payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The codec could not encode an outbound payload.
    #[error("encode error: {0}")]
    Encode(String),

    /// The server addressed a frame to a request id that was never issued.
    #[error("frame for unknown request {request_id}")]
    UnknownRequest {
        /// The unrecognized id.
        request_id: RequestId,
    },

    /// The server sent a frame that makes no sense in the current state.
    #[error("protocol violation: {message}")]
    ProtocolViolation {
        /// What went wrong.
        message: String,
    },

    /// The client has not finished connecting.
    #[error("client is not connected yet")]
    NotConnected,

    /// The client hit a fatal error and accepts no new requests.
    #[error("client has failed")]
    Failed,

    /// The client was closed.
    #[error("client is closed")]
    Closed,

    /// Teardown was attempted while requests are still live.
    #[error("cannot close client: {count} requests still outstanding")]
    RequestsOutstanding {
        /// Number of live requests.
        count: usize,
    },

    /// The encoded payload does not fit in a frame.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Encoded payload size.
        size: usize,
        /// Largest payload a frame can carry.
        max: usize,
    },

    /// The configured outstanding-request limit was reached.
    #[error("too many outstanding requests (limit {limit})")]
    TooManyRequests {
        /// The configured limit.
        limit: usize,
    },

    /// The request already reached a terminal state.
    #[error("request {request_id} is already {state}")]
    RequestTerminated {
        /// The request id.
        request_id: RequestId,
        /// Its terminal state.
        state: RequestState,
    },

    /// Every request id is in use.
    #[error("no free request ids")]
    RequestIdsExhausted,
}

impl ClientError {
    /// Whether this error terminates the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectFailed { .. }
                | ClientError::ConnectTimeout { .. }
                | ClientError::ConnectionClosed
                | ClientError::Io(_)
                | ClientError::Wire(_)
                | ClientError::Codec(_)
                | ClientError::UnknownRequest { .. }
                | ClientError::ProtocolViolation { .. }
        )
    }
}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        ClientError::Io(error.to_string())
    }
}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        ClientError::Codec(error.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
