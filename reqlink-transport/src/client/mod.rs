//! Client connection management.
//!
//! A [`Client`] owns one connection to a server and multiplexes any number
//! of concurrent requests over it.
//!
//! # Connection Lifecycle
//!
//! ```text
//! ┌────────────┐  connected   ┌───────────┐
//! │ Connecting ├─────────────►│ Connected │
//! └─────┬──────┘              └──┬─────┬──┘
//!       │ connect error          │     │ close()
//!       │ or timeout             │     ▼
//!       │        fatal error     │  ┌────────┐
//!       ▼◄───────────────────────┘  │ Closed │
//! ┌────────┐                        └────────┘
//! │ Failed │
//! └────────┘
//! ```
//!
//! `Failed` and `Closed` are terminal. A failed client reports its error
//! once through [`ClientHandler::on_error`](crate::ClientHandler::on_error)
//! and must be replaced to talk to the server again.
//!
//! # Background Task
//!
//! All socket I/O happens on a task spawned through the providers'
//! [`TaskProvider`](crate::TaskProvider). The synchronous API only updates
//! shared state and queues frames; the task writes queued frames in order,
//! reads inbound frames and dispatches them to request handlers.
//!
//! # Configuration
//!
//! ```ignore
//! use reqlink_transport::ClientConfig;
//!
//! let config = ClientConfig::default()
//!     .with_connect_timeout(Duration::from_secs(2))
//!     .with_max_outstanding_requests(64);
//! ```

/// Client state machine and connection task.
pub mod core;

/// Configuration for client behavior.
pub mod config;

/// Counters for frames and requests.
pub mod metrics;

mod send_queue;

pub use config::ClientConfig;
pub use self::core::{Client, ClientState};
pub(crate) use self::core::ClientShared;
pub use metrics::ClientMetrics;
