//! Metrics collection for a client connection.

use std::time::Duration;

/// Counters describing a client's traffic and request activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMetrics {
    /// Frames fully written to the connection
    pub frames_sent: u64,

    /// Frames parsed from the connection
    pub frames_received: u64,

    /// Bytes written, headers included
    pub bytes_sent: u64,

    /// Bytes parsed, headers included
    pub bytes_received: u64,

    /// Requests accepted by `submit`
    pub requests_submitted: u64,

    /// Requests that reached `Finished`
    pub requests_finished: u64,

    /// Requests that reached `Aborted` while the client held them
    pub requests_aborted: u64,

    /// Inbound frames dropped because their request was aborted
    pub frames_discarded: u64,

    /// Requests currently live
    pub live_requests: usize,

    /// Frames waiting in the send queue
    pub queued_frames: usize,

    /// Provider time at which the connection was established
    pub connected_at: Option<Duration>,
}

impl ClientMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame written.
    pub fn record_frame_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Record a frame received.
    pub fn record_frame_received(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }

    /// Record a request submission.
    pub fn record_submitted(&mut self) {
        self.requests_submitted += 1;
    }

    /// Record `count` requests finishing.
    pub fn record_finished(&mut self, count: usize) {
        self.requests_finished += count as u64;
    }

    /// Record a request abort.
    pub fn record_aborted(&mut self) {
        self.requests_aborted += 1;
    }

    /// Record an inbound frame dropped for an aborted request.
    pub fn record_discarded(&mut self) {
        self.frames_discarded += 1;
    }

    /// Requests accepted that have not yet finished or been aborted.
    pub fn outstanding(&self) -> u64 {
        self.requests_submitted
            .saturating_sub(self.requests_finished + self.requests_aborted)
    }
}
