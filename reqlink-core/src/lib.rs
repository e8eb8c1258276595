//! # reqlink-core
//!
//! Core abstractions shared by the reqlink client.
//!
//! - **Value model**: [`Value`], the structured payload carried by requests
//!   and replies
//! - **Codec trait**: [`ValueCodec`] turns values into bytes and back
//! - **Addressing**: [`ServerAddress`] for Unix-domain and TCP endpoints
//! - **Provider traits**: networking, time and task spawning, bundled by
//!   [`Providers`] so the event loop is passed explicitly
//!
//! ## Provider Traits
//!
//! The client never touches tokio directly. It goes through:
//!
//! - [`NetworkProvider`]: connection establishment for both address kinds
//! - [`TimeProvider`]: timeouts
//! - [`TaskProvider`]: spawning local tasks on the current thread
//!
//! [`TokioProviders`] wires the production implementations together; tests
//! substitute their own network provider to script the remote peer.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod address;
mod codec;
mod network;
mod providers;
mod task;
mod time;
mod value;

// Address exports
pub use address::{AddressParseError, MAX_UNIX_PATH_LEN, ServerAddress};

// Codec exports
pub use codec::{CodecError, JsonCodec, ValueCodec};

// Provider trait exports
pub use network::{NetworkProvider, TokioNetworkProvider, TokioStream};
pub use providers::{Providers, TokioProviders};
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};

// Value exports
pub use value::Value;
