//! Ordered queue of serialized outbound frames.

use std::collections::VecDeque;

use crate::{FrameKind, RequestId};

/// A frame ready to be written.
pub(crate) struct OutboundFrame {
    pub(crate) request_id: RequestId,
    pub(crate) kind: FrameKind,
    pub(crate) bytes: Vec<u8>,
}

impl OutboundFrame {
    pub(crate) fn new(request_id: RequestId, kind: FrameKind, bytes: Vec<u8>) -> Self {
        Self {
            request_id,
            kind,
            bytes,
        }
    }
}

/// FIFO of pending frames plus the one currently being written.
///
/// Frames are written strictly in enqueue order and never interleave.
#[derive(Default)]
pub(crate) struct SendQueue {
    pending: VecDeque<OutboundFrame>,
    in_flight: Option<RequestId>,
}

impl SendQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Returns true if the writer was idle and needs a wakeup.
    pub(crate) fn push(&mut self, frame: OutboundFrame) -> bool {
        let was_idle = self.pending.is_empty() && self.in_flight.is_none();
        self.pending.push_back(frame);
        was_idle
    }

    /// Take the next frame and mark it in flight.
    pub(crate) fn pop_front(&mut self) -> Option<OutboundFrame> {
        let frame = self.pending.pop_front()?;
        self.in_flight = Some(frame.request_id);
        Some(frame)
    }

    /// The in-flight frame was fully written.
    pub(crate) fn complete(&mut self) {
        self.in_flight = None;
    }

    /// Drop the pending REQUEST frame for `request_id`.
    ///
    /// Returns false if it is not pending (in flight or already written).
    pub(crate) fn remove_request(&mut self, request_id: RequestId) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|frame| !(frame.request_id == request_id && frame.kind == FrameKind::Request));
        self.pending.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = None;
    }
}
