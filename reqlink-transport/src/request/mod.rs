//! Request lifecycle management.
//!
//! Every request moves through a small state machine:
//!
//! ```text
//! ┌─────────┐ submit ┌────────┐ written ┌──────┐ REPLY ┌──────────┐
//! │ Created ├───────►│ Queued ├────────►│ Sent ├──────►│ Replying │◄─┐
//! └─────────┘        └───┬────┘         └──┬───┘       └──┬───┬───┘  │ REPLY
//!                        │                 │              │   └──────┘
//!                        │ abort           │ FINISHED     │ FINISHED
//!                        ▼                 ▼              ▼
//!                  ┌─────────┐        ┌──────────────────────┐
//!                  │ Aborted │        │       Finished       │
//!                  └─────────┘        └──────────────────────┘
//! ```
//!
//! `Sent` and `Replying` can also be aborted. `Finished` and `Aborted` are
//! terminal: no callback fires for the request after either.
//!
//! The client keeps live requests in a [`RequestTable`] keyed by id. Ids of
//! requests aborted while connected stay reserved (tombstoned) until the
//! server's terminal frame for them arrives, so late frames are recognized
//! and dropped instead of being routed to a newer request.

/// Request handle and state.
pub mod handle;

/// Callback traits and channel-backed handlers.
pub mod handler;

mod table;

/// Identifier the client assigns to each request, unique among live ones.
pub type RequestId = u32;

pub use handle::{Request, RequestState};
pub use handler::{
    ChannelClientHandler, ChannelRequestHandler, ClientEvent, ClientHandler, RequestEvent,
    RequestHandler,
};
pub(crate) use table::{Lookup, RequestSlot, RequestTable};
