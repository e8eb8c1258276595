//! Caller-side request handle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::RequestId;
use crate::client::ClientShared;
use crate::{ClientError, ClientResult};

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Registered but not yet queued.
    Created,
    /// Frame waiting in the send queue.
    Queued,
    /// Frame fully written.
    Sent,
    /// At least one reply received.
    Replying,
    /// The server ended the request.
    Finished,
    /// Aborted by the caller.
    Aborted,
}

impl RequestState {
    /// Whether no further callbacks can fire for the request.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Finished | RequestState::Aborted)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Created => "created",
            RequestState::Queued => "queued",
            RequestState::Sent => "sent",
            RequestState::Replying => "replying",
            RequestState::Finished => "finished",
            RequestState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Handle to a submitted request.
///
/// Dropping a handle whose request is still live aborts it.
pub struct Request {
    id: RequestId,
    state: Rc<Cell<RequestState>>,
    client: Weak<RefCell<ClientShared>>,
}

impl Request {
    pub(crate) fn new(
        id: RequestId,
        state: Rc<Cell<RequestState>>,
        client: Weak<RefCell<ClientShared>>,
    ) -> Self {
        Self { id, state, client }
    }

    /// Id assigned by the client.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RequestState {
        self.state.get()
    }

    /// Whether the request reached `Finished` or `Aborted`.
    pub fn is_terminal(&self) -> bool {
        self.state.get().is_terminal()
    }

    /// Stop the request. No callback fires for it afterwards.
    ///
    /// A request still in the send queue is never written. While the client
    /// is connected the id stays reserved until the server finishes it, and
    /// the server's remaining frames for it are discarded.
    pub fn abort(&self) -> ClientResult<()> {
        let state = self.state.get();
        if state.is_terminal() {
            return Err(ClientError::RequestTerminated {
                request_id: self.id,
                state,
            });
        }

        // Terminal before the slot goes away: dropping the slot can drop
        // handles that point back at this request.
        self.state.set(RequestState::Aborted);

        if let Some(shared) = self.client.upgrade() {
            // Callbacks run with the client unborrowed, so this always succeeds.
            let borrowed = shared.try_borrow_mut();
            debug_assert!(
                borrowed.is_ok(),
                "request {} aborted while the client is borrowed",
                self.id
            );
            let removed = match borrowed {
                Ok(mut shared) => shared.abort_request(self.id),
                Err(_) => {
                    tracing::error!(request_id = self.id, "client borrowed during abort");
                    None
                }
            };
            drop(removed);
        }

        tracing::debug!(request_id = self.id, previous = %state, "request aborted");
        Ok(())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if !self.is_terminal() {
            tracing::debug!(request_id = self.id, "request handle dropped while live");
            let _ = self.abort();
        }
    }
}
