//! Client implementation: shared state, public API and the connection task.
//!
//! Wire format: `[length:4][checksum:4][request_id:4][kind:4][payload]`

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use super::config::ClientConfig;
use super::metrics::ClientMetrics;
use super::send_queue::{OutboundFrame, SendQueue};
use crate::request::{Lookup, RequestSlot, RequestTable};
use crate::{
    ClientError, ClientHandler, ClientResult, Frame, FrameKind, JsonCodec, MAX_PAYLOAD_SIZE,
    NetworkProvider, Providers, Request, RequestHandler, RequestId, RequestState, ServerAddress,
    TaskProvider, TimeProvider, Value, ValueCodec, serialize_frame, try_deserialize_frame,
};

/// Connection state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// The connection attempt is in progress.
    Connecting,
    /// Requests may be submitted.
    Connected,
    /// A fatal error ended the connection.
    Failed,
    /// The caller closed the client.
    Closed,
}

impl ClientState {
    /// Whether the client can never accept requests again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientState::Failed | ClientState::Closed)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Connecting => "connecting",
            ClientState::Connected => "connected",
            ClientState::Failed => "failed",
            ClientState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State shared between the client, request handles and the connection task.
///
/// Never borrowed across an await point or a handler callback.
pub(crate) struct ClientShared {
    state: ClientState,
    address: ServerAddress,
    handler: Rc<dyn ClientHandler>,
    requests: RequestTable,
    send_queue: SendQueue,
    /// Wakes the connection task when the send queue goes from idle to busy
    data_to_send: Rc<Notify>,
    config: ClientConfig,
    metrics: ClientMetrics,
}

impl ClientShared {
    fn new(
        address: ServerAddress,
        config: ClientConfig,
        handler: Rc<dyn ClientHandler>,
        data_to_send: Rc<Notify>,
    ) -> Self {
        Self {
            state: ClientState::Connecting,
            address,
            handler,
            requests: RequestTable::new(),
            send_queue: SendQueue::new(),
            data_to_send,
            config,
            metrics: ClientMetrics::new(),
        }
    }

    fn ensure_accepting(&self) -> ClientResult<()> {
        match self.state {
            ClientState::Connected => Ok(()),
            ClientState::Connecting => Err(ClientError::NotConnected),
            ClientState::Failed => Err(ClientError::Failed),
            ClientState::Closed => Err(ClientError::Closed),
        }
    }

    fn enqueue(&mut self, frame: OutboundFrame) {
        if self.send_queue.push(frame) {
            self.data_to_send.notify_one();
        }
    }

    /// Register a request and queue its frame.
    fn register(
        &mut self,
        payload: &[u8],
        handler: Rc<dyn RequestHandler>,
    ) -> ClientResult<(RequestId, Rc<Cell<RequestState>>)> {
        self.ensure_accepting()?;

        if let Some(limit) = self.config.max_outstanding_requests {
            if self.requests.live_count() >= limit {
                return Err(ClientError::TooManyRequests { limit });
            }
        }
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ClientError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let request_id = self
            .requests
            .allocate_id()
            .ok_or(ClientError::RequestIdsExhausted)?;
        let bytes = serialize_frame(request_id, FrameKind::Request, payload)?;

        let state = Rc::new(Cell::new(RequestState::Created));
        self.requests.insert(
            request_id,
            RequestSlot {
                state: state.clone(),
                handler,
            },
        );
        self.enqueue(OutboundFrame::new(request_id, FrameKind::Request, bytes));
        state.set(RequestState::Queued);
        self.metrics.record_submitted();

        tracing::debug!(request_id, bytes = payload.len(), "request queued");
        Ok((request_id, state))
    }

    /// Forget a request the caller aborted.
    ///
    /// The removed slot is returned so the caller drops it outside the borrow.
    pub(crate) fn abort_request(&mut self, request_id: RequestId) -> Option<RequestSlot> {
        let slot = self.requests.remove(request_id)?;
        self.metrics.record_aborted();

        let still_queued = self.send_queue.remove_request(request_id);
        if self.state != ClientState::Connected {
            return Some(slot);
        }

        // Hold the id until a FINISHED for it arrives, even if the REQUEST
        // frame never left the queue. Tombstones are dropped on close or
        // failure.
        self.requests.tombstone(request_id);
        if self.config.notify_peer_on_abort && !still_queued {
            match serialize_frame(request_id, FrameKind::Abort, &[]) {
                Ok(bytes) => {
                    tracing::trace!(request_id, "queueing abort frame");
                    self.enqueue(OutboundFrame::new(request_id, FrameKind::Abort, bytes));
                }
                Err(e) => tracing::warn!(request_id, error = %e, "failed to build abort frame"),
            }
        }
        Some(slot)
    }

    /// Route a REPLY. `Ok(None)` means the frame is discarded.
    fn route_reply(
        &mut self,
        request_id: RequestId,
    ) -> ClientResult<Option<Rc<dyn RequestHandler>>> {
        match self.requests.lookup(request_id) {
            Lookup::Live(slot) if slot.state.get() == RequestState::Aborted => {
                tracing::debug!(request_id, "discarding reply for aborted request");
                self.metrics.record_discarded();
                Ok(None)
            }
            Lookup::Live(slot) => {
                if slot.state.get() == RequestState::Queued {
                    return Err(ClientError::ProtocolViolation {
                        message: format!("reply for request {request_id} before it was sent"),
                    });
                }
                slot.state.set(RequestState::Replying);
                Ok(Some(slot.handler.clone()))
            }
            Lookup::Tombstoned => {
                tracing::debug!(request_id, "discarding reply for aborted request");
                self.metrics.record_discarded();
                Ok(None)
            }
            Lookup::Unknown => Err(ClientError::UnknownRequest { request_id }),
        }
    }

    /// Route a FINISHED or FAILED. `Ok(None)` means the frame is discarded.
    ///
    /// A returned slot still in `Aborted` is only being released; the caller
    /// drops it outside the borrow without calling its handler.
    fn route_finished(&mut self, request_id: RequestId) -> ClientResult<Option<RequestSlot>> {
        match self.requests.lookup(request_id) {
            Lookup::Live(slot) if slot.state.get() == RequestState::Queued => {
                return Err(ClientError::ProtocolViolation {
                    message: format!("request {request_id} finished before it was sent"),
                });
            }
            Lookup::Live(_) => {}
            Lookup::Tombstoned => {
                tracing::debug!(request_id, "aborted request finished, releasing id");
                self.requests.clear_tombstone(request_id);
                self.metrics.record_discarded();
                return Ok(None);
            }
            Lookup::Unknown => return Err(ClientError::UnknownRequest { request_id }),
        }

        let slot = self.requests.remove(request_id);
        if let Some(slot) = &slot {
            if slot.state.get() == RequestState::Aborted {
                self.metrics.record_discarded();
            } else {
                slot.state.set(RequestState::Finished);
                self.metrics.record_finished(1);
            }
        }
        Ok(slot)
    }

    /// Mark the in-flight frame written. Returns the handler owed `on_sent`.
    fn complete_send(&mut self, frame: &OutboundFrame) -> Option<Rc<dyn RequestHandler>> {
        self.send_queue.complete();
        self.metrics.record_frame_sent(frame.bytes.len());

        if frame.kind != FrameKind::Request {
            return None;
        }
        let slot = self.requests.get(frame.request_id)?;
        if slot.state.get() != RequestState::Queued {
            return None;
        }
        slot.state.set(RequestState::Sent);
        Some(slot.handler.clone())
    }

    fn metrics_snapshot(&self) -> ClientMetrics {
        let mut metrics = self.metrics.clone();
        metrics.live_requests = self.requests.live_count();
        metrics.queued_frames = self.send_queue.len();
        metrics
    }
}

/// A client connection to one server.
///
/// Created in `Connecting`; the background task reports the outcome through
/// [`ClientHandler::on_connected`] or [`ClientHandler::on_error`]. Requests
/// are accepted only while `Connected`.
///
/// Must be created inside a `tokio::task::LocalSet`.
pub struct Client<C: ValueCodec = JsonCodec> {
    shared: Rc<RefCell<ClientShared>>,
    codec: C,

    /// Shutdown signaling for connection_task
    shutdown_tx: mpsc::UnboundedSender<()>,

    task_handle: Option<JoinHandle<()>>,
}

impl Client<JsonCodec> {
    /// Start connecting to `address` with JSON-encoded payloads.
    ///
    /// Returns immediately in `Connecting`. Fails synchronously only if the
    /// address is unusable.
    pub fn connect<P: Providers>(
        providers: &P,
        address: ServerAddress,
        config: ClientConfig,
        handler: Rc<dyn ClientHandler>,
    ) -> ClientResult<Self> {
        Self::connect_with_codec(providers, address, config, JsonCodec, handler)
    }
}

impl<C: ValueCodec> Client<C> {
    /// Start connecting to `address`, encoding payloads with `codec`.
    pub fn connect_with_codec<P: Providers>(
        providers: &P,
        address: ServerAddress,
        config: ClientConfig,
        codec: C,
        handler: Rc<dyn ClientHandler>,
    ) -> ClientResult<Self> {
        address.validate()?;

        let data_to_send = Rc::new(Notify::new());
        let shared = Rc::new(RefCell::new(ClientShared::new(
            address.clone(),
            config.clone(),
            handler,
            data_to_send.clone(),
        )));
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        tracing::debug!(%address, "client connecting");

        let task_handle = providers.task().spawn_task(
            "client_connection",
            connection_task(
                shared.clone(),
                data_to_send,
                providers.clone(),
                address,
                codec.clone(),
                config,
                shutdown_rx,
            ),
        );

        Ok(Self {
            shared,
            codec,
            shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ClientState {
        self.shared.borrow().state
    }

    /// Whether requests can be submitted.
    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    /// Server address this client talks to.
    pub fn address(&self) -> ServerAddress {
        self.shared.borrow().address.clone()
    }

    /// Number of live requests.
    pub fn outstanding_requests(&self) -> usize {
        self.shared.borrow().requests.live_count()
    }

    /// Snapshot of the client's counters.
    pub fn metrics(&self) -> ClientMetrics {
        self.shared.borrow().metrics_snapshot()
    }

    /// Submit a request.
    ///
    /// The payload is encoded and queued; `handler` receives the request's
    /// events. Fails if the client is not `Connected`.
    pub fn submit(
        &self,
        payload: &Value,
        handler: Rc<dyn RequestHandler>,
    ) -> ClientResult<Request> {
        self.shared.borrow().ensure_accepting()?;
        let encoded = self
            .codec
            .encode(payload)
            .map_err(|e| ClientError::Encode(e.to_string()))?;

        let (request_id, state) = self.shared.borrow_mut().register(&encoded, handler)?;
        Ok(Request::new(request_id, state, Rc::downgrade(&self.shared)))
    }

    /// Close the connection.
    ///
    /// Refused while requests are live: finish or abort them first.
    pub fn close(&self) -> ClientResult<()> {
        {
            let mut shared = self.shared.borrow_mut();
            if shared.state == ClientState::Closed {
                return Err(ClientError::Closed);
            }
            let count = shared.requests.live_count();
            if count > 0 {
                return Err(ClientError::RequestsOutstanding { count });
            }
            shared.state = ClientState::Closed;
            shared.send_queue.clear();
            shared.requests.clear_tombstones();
        }

        tracing::debug!("client closed");
        let _ = self.shutdown_tx.send(());
        Ok(())
    }
}

impl<C: ValueCodec> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.try_borrow() {
            Ok(shared) => f
                .debug_struct("Client")
                .field("address", &shared.address)
                .field("state", &shared.state)
                .field("live_requests", &shared.requests.live_count())
                .finish(),
            Err(_) => f.debug_struct("Client").finish_non_exhaustive(),
        }
    }
}

impl<C: ValueCodec> Drop for Client<C> {
    fn drop(&mut self) {
        if let Ok(mut shared) = self.shared.try_borrow_mut() {
            let live = shared.requests.live_count();
            if live > 0 {
                tracing::warn!(live, "client dropped with live requests");
            }
            if !shared.state.is_terminal() {
                shared.state = ClientState::Closed;
            }
            shared.send_queue.clear();
        }

        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Background task owning the connection.
///
/// Connects, then loops writing queued frames and reading inbound ones
/// until shutdown or a fatal error.
async fn connection_task<P: Providers, C: ValueCodec>(
    shared: Rc<RefCell<ClientShared>>,
    data_to_send: Rc<Notify>,
    providers: P,
    address: ServerAddress,
    codec: C,
    config: ClientConfig,
    mut shutdown_rx: mpsc::UnboundedReceiver<()>,
) {
    let connect = providers.network().connect(&address);
    let connect_result = tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::trace!("connection_task: shutdown while connecting");
            return;
        }
        result = providers.time().timeout(config.connect_timeout, connect) => result,
    };

    let mut stream = match connect_result {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            fail(
                &shared,
                ClientError::ConnectFailed {
                    address: address.to_string(),
                    message: e.to_string(),
                },
            );
            return;
        }
        Err(_) => {
            fail(
                &shared,
                ClientError::ConnectTimeout {
                    timeout: config.connect_timeout,
                },
            );
            return;
        }
    };

    if !mark_connected(&shared, providers.time().now()) {
        return;
    }

    // Buffer for accumulating partial frame reads
    let mut read_buffer: Vec<u8> = Vec::with_capacity(config.read_chunk_size);
    let mut chunk = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                break;
            }

            _ = data_to_send.notified() => {
                if !drain_send_queue(&shared, &mut stream).await {
                    break;
                }
            }

            read_result = stream.read(&mut chunk) => {
                match read_result {
                    Ok(0) => {
                        fail(&shared, ClientError::ConnectionClosed);
                        break;
                    }
                    Ok(n) => {
                        read_buffer.extend_from_slice(&chunk[..n]);
                        tracing::trace!(bytes = n, buffered = read_buffer.len(), "connection_task: read");
                        if !process_read_buffer(&shared, &codec, &mut read_buffer) {
                            break;
                        }
                    }
                    Err(e) => {
                        fail(&shared, e.into());
                        break;
                    }
                }
            }
        }
    }

    tracing::trace!("connection_task: exiting");
}

/// Move `Connecting` to `Connected` and notify the handler.
/// Returns false if the task should exit.
fn mark_connected(shared: &Rc<RefCell<ClientShared>>, now: std::time::Duration) -> bool {
    let handler = {
        let mut state = shared.borrow_mut();
        if state.state != ClientState::Connecting {
            return false;
        }
        state.state = ClientState::Connected;
        state.metrics.connected_at = Some(now);
        state.handler.clone()
    };

    tracing::debug!("client connected");
    handler.on_connected();
    shared.borrow().state == ClientState::Connected
}

/// Write every queued frame in order. Returns false if the task should exit.
async fn drain_send_queue<S: AsyncWrite + Unpin>(
    shared: &Rc<RefCell<ClientShared>>,
    stream: &mut S,
) -> bool {
    loop {
        let frame = {
            let mut state = shared.borrow_mut();
            if state.state != ClientState::Connected {
                return false;
            }
            state.send_queue.pop_front()
        };

        let Some(frame) = frame else {
            break;
        };

        tracing::trace!(
            request_id = frame.request_id,
            kind = %frame.kind,
            bytes = frame.bytes.len(),
            "connection_task: writing frame"
        );

        // No RefCell borrow held across the write
        if let Err(e) = stream.write_all(&frame.bytes).await {
            fail(shared, e.into());
            return false;
        }

        let sent_handler = {
            let mut state = shared.borrow_mut();
            if state.state != ClientState::Connected {
                return false;
            }
            state.complete_send(&frame)
        };
        if let Some(handler) = sent_handler {
            tracing::debug!(request_id = frame.request_id, "request sent");
            handler.on_sent();
        }
    }

    if let Err(e) = stream.flush().await {
        fail(shared, e.into());
        return false;
    }
    true
}

/// Parse and dispatch every complete frame in the buffer.
/// Returns false if the task should exit.
fn process_read_buffer<C: ValueCodec>(
    shared: &Rc<RefCell<ClientShared>>,
    codec: &C,
    read_buffer: &mut Vec<u8>,
) -> bool {
    loop {
        match try_deserialize_frame(read_buffer) {
            Ok(Some((frame, consumed))) => {
                read_buffer.drain(..consumed);
                shared.borrow_mut().metrics.record_frame_received(consumed);

                if let Err(e) = dispatch(shared, codec, frame) {
                    fail(shared, e);
                    return false;
                }

                // A callback may have closed the client
                if shared.borrow().state != ClientState::Connected {
                    return false;
                }
            }
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!(error = %e, "wire format error - tearing down connection");
                fail(shared, e.into());
                return false;
            }
        }
    }
}

/// Deliver one inbound frame to its request.
fn dispatch<C: ValueCodec>(
    shared: &Rc<RefCell<ClientShared>>,
    codec: &C,
    frame: Frame,
) -> ClientResult<()> {
    let Frame {
        request_id,
        kind,
        payload,
    } = frame;

    match kind {
        FrameKind::Request | FrameKind::Abort => Err(ClientError::ProtocolViolation {
            message: format!("server sent {kind} frame for request {request_id}"),
        }),
        FrameKind::Reply => {
            let Some(handler) = shared.borrow_mut().route_reply(request_id)? else {
                return Ok(());
            };
            let reply = codec.decode(&payload)?;
            tracing::debug!(request_id, "reply received");
            handler.on_reply(reply);
            Ok(())
        }
        FrameKind::Finished | FrameKind::Failed => {
            let is_error = kind == FrameKind::Failed;
            let Some(slot) = shared.borrow_mut().route_finished(request_id)? else {
                return Ok(());
            };
            if slot.state.get() == RequestState::Aborted {
                return Ok(());
            }
            tracing::debug!(request_id, is_error, "request finished");
            slot.handler.on_finished(is_error);
            Ok(())
        }
    }
}

/// Move the client to `Failed` and report `error`.
///
/// Only the first fatal error is reported; later ones, or errors after
/// `close()`, are logged and dropped.
fn fail(shared: &Rc<RefCell<ClientShared>>, error: ClientError) {
    debug_assert!(error.is_fatal(), "non-fatal error routed to fail: {error}");
    let (handler, finished) = {
        let mut state = shared.borrow_mut();
        if state.state.is_terminal() {
            tracing::debug!(error = %error, state = %state.state, "ignoring error on terminal client");
            return;
        }

        tracing::warn!(error = %error, address = %state.address, "client failed");
        state.state = ClientState::Failed;
        state.send_queue.clear();
        state.requests.clear_tombstones();

        let finished = if state.config.finish_requests_on_failure {
            state.requests.drain_live()
        } else {
            Vec::new()
        };
        for (_, slot) in &finished {
            slot.state.set(RequestState::Finished);
        }
        state.metrics.record_finished(finished.len());

        (state.handler.clone(), finished)
    };

    for (request_id, slot) in finished {
        tracing::debug!(request_id, "finishing request after client failure");
        slot.handler.on_finished(true);
    }
    handler.on_error(&error);
}
