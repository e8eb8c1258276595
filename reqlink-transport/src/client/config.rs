//! Configuration structures for client behavior.

use std::time::Duration;

/// Configuration for a client connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,

    /// Maximum number of live requests; `submit` fails beyond it.
    /// None means unlimited
    pub max_outstanding_requests: Option<usize>,

    /// When the client fails, finish every live request with
    /// `on_finished(true)` before reporting the error.
    ///
    /// Requests whose frame was still queued get `on_finished(true)` without
    /// a preceding `on_sent`.
    pub finish_requests_on_failure: bool,

    /// Send an ABORT frame to the server when a request is aborted after
    /// its frame was written.
    pub notify_peer_on_abort: bool,

    /// Size of each socket read
    pub read_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_outstanding_requests: None,
            finish_requests_on_failure: false,
            notify_peer_on_abort: false,
            read_chunk_size: 4096,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for a server on the same host.
    pub fn local() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
            read_chunk_size: 16 * 1024,
            ..Self::default()
        }
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Cap the number of live requests.
    pub fn with_max_outstanding_requests(mut self, limit: usize) -> Self {
        self.max_outstanding_requests = Some(limit);
        self
    }

    /// Finish live requests with an error when the client fails.
    ///
    /// Queued requests are finished too, so they never see `on_sent`.
    pub fn with_finish_requests_on_failure(mut self, enabled: bool) -> Self {
        self.finish_requests_on_failure = enabled;
        self
    }

    /// Tell the server about aborted requests.
    pub fn with_notify_peer_on_abort(mut self, enabled: bool) -> Self {
        self.notify_peer_on_abort = enabled;
        self
    }

    /// Set the socket read size. Values below 1 are raised to 1.
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }
}
