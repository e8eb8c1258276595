//! Callback traits for connection and request events.
//!
//! The client calls these from its connection task, with no internal
//! borrow held, so a callback may freely submit, abort or close.

use std::rc::Rc;

use reqlink_core::Value;
use tokio::sync::mpsc;

use crate::ClientError;

/// Receives connection-level events.
pub trait ClientHandler {
    /// The connection is established; requests may now be submitted.
    fn on_connected(&self);

    /// The client hit a fatal error. Called at most once per client.
    fn on_error(&self, error: &ClientError);
}

/// Receives events for a single request.
pub trait RequestHandler {
    /// The request frame was fully written to the connection.
    fn on_sent(&self);

    /// A reply arrived. May be called any number of times.
    fn on_reply(&self, reply: Value);

    /// The server ended the request. Always the last callback.
    fn on_finished(&self, is_error: bool);
}

/// Event forwarded by [`ChannelRequestHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// See [`RequestHandler::on_sent`].
    Sent,
    /// See [`RequestHandler::on_reply`].
    Reply(Value),
    /// See [`RequestHandler::on_finished`].
    Finished {
        /// Whether the server reported failure.
        is_error: bool,
    },
}

/// Request handler that forwards events into an unbounded channel.
#[derive(Debug)]
pub struct ChannelRequestHandler {
    tx: mpsc::UnboundedSender<RequestEvent>,
}

impl ChannelRequestHandler {
    /// Create a handler and the receiver its events go to.
    pub fn new() -> (Rc<Self>, mpsc::UnboundedReceiver<RequestEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Rc::new(Self { tx }), rx)
    }

    fn forward(&self, event: RequestEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("request event receiver dropped");
        }
    }
}

impl RequestHandler for ChannelRequestHandler {
    fn on_sent(&self) {
        self.forward(RequestEvent::Sent);
    }

    fn on_reply(&self, reply: Value) {
        self.forward(RequestEvent::Reply(reply));
    }

    fn on_finished(&self, is_error: bool) {
        self.forward(RequestEvent::Finished { is_error });
    }
}

/// Event forwarded by [`ChannelClientHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// See [`ClientHandler::on_connected`].
    Connected,
    /// See [`ClientHandler::on_error`].
    Error(ClientError),
}

/// Client handler that forwards events into an unbounded channel.
#[derive(Debug)]
pub struct ChannelClientHandler {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelClientHandler {
    /// Create a handler and the receiver its events go to.
    pub fn new() -> (Rc<Self>, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Rc::new(Self { tx }), rx)
    }
}

impl ClientHandler for ChannelClientHandler {
    fn on_connected(&self) {
        if self.tx.send(ClientEvent::Connected).is_err() {
            tracing::trace!("client event receiver dropped");
        }
    }

    fn on_error(&self, error: &ClientError) {
        if self.tx.send(ClientEvent::Error(error.clone())).is_err() {
            tracing::trace!("client event receiver dropped");
        }
    }
}
