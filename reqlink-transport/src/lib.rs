//! # Reqlink Transport
//!
//! Client engine for a multiplexed request/reply protocol carried over one
//! stream connection (Unix socket or TCP).
//!
//! This crate provides:
//! - **Client**: connection state machine with a background I/O task
//! - **Requests**: id allocation, per-request lifecycle and abort handling
//! - **Wire format**: length-prefixed frames with CRC32C checksums
//! - **Handlers**: callback traits for connection and request events
//!
//! ```ignore
//! use reqlink_transport::{ChannelClientHandler, ChannelRequestHandler, Client, ClientConfig};
//! use reqlink_core::{TokioProviders, Value};
//!
//! let (client_handler, mut client_events) = ChannelClientHandler::new();
//! let client = Client::connect(
//!     &TokioProviders::new(),
//!     "unix:/run/service.sock".parse()?,
//!     ClientConfig::default(),
//!     client_handler,
//! )?;
//!
//! // wait for ClientEvent::Connected, then:
//! let (handler, mut events) = ChannelRequestHandler::new();
//! let request = client.submit(&Value::from("status"), handler)?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub use reqlink_core::{
    AddressParseError, CodecError, JsonCodec, NetworkProvider, Providers, ServerAddress,
    TaskProvider, TimeProvider, TokioNetworkProvider, TokioProviders, Value, ValueCodec,
};

// =============================================================================
// Modules
// =============================================================================

/// Error types for client operations.
pub mod error;

/// Length-prefixed wire format with CRC32C checksums.
pub mod wire;

/// Request handles, handlers and the request table.
pub mod request;

/// Client state machine and connection task.
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ClientError, ClientResult};

pub use wire::{
    Frame, FrameHeader, FrameKind, HEADER_SIZE, MAX_PAYLOAD_SIZE, WireError, serialize_frame,
    try_deserialize_frame,
};

pub use request::{
    ChannelClientHandler, ChannelRequestHandler, ClientEvent, ClientHandler, Request,
    RequestEvent, RequestHandler, RequestId, RequestState,
};

pub use client::{Client, ClientConfig, ClientMetrics, ClientState};
