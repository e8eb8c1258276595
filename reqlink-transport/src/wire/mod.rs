//! Wire format for request/reply frames.
//!
//! Frame format: `[length:4][checksum:4][request_id:4][kind:4][payload:N]`
//!
//! - **length**: Total frame size including header (little-endian u32)
//! - **checksum**: CRC32C of (request_id + kind + payload)
//! - **request_id**: Correlates a frame with the request that caused it
//! - **kind**: One of [`FrameKind`] (little-endian u32)
//! - **payload**: Codec-encoded value for REQUEST and REPLY, empty otherwise

use crate::RequestId;

/// Header size: 4 (length) + 4 (checksum) + 4 (request_id) + 4 (kind) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Maximum payload size (1MB).
///
/// Frames larger than this are rejected to prevent memory exhaustion.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Wire format error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Not enough data to parse the frame.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to parse.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// Checksum verification failed - data was corrupted.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum from header.
        expected: u32,
        /// Computed checksum from data.
        actual: u32,
    },

    /// Payload exceeds maximum allowed size.
    #[error("frame too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    FrameTooLarge {
        /// Payload size in bytes.
        size: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid frame length: {length}")]
    InvalidLength {
        /// The invalid length value from the header.
        length: u32,
    },

    /// Kind field does not name a known message.
    #[error("unknown frame kind: {kind}")]
    UnknownKind {
        /// The unrecognized kind value.
        kind: u32,
    },
}

/// Logical message kinds carried on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FrameKind {
    /// Client to server: start a request.
    Request = 1,
    /// Client to server: stop working on a request.
    Abort = 2,
    /// Server to client: one reply value for a request.
    Reply = 3,
    /// Server to client: request completed successfully.
    Finished = 4,
    /// Server to client: request completed with an error.
    Failed = 5,
}

impl FrameKind {
    /// Numeric value written on the wire.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Parse a wire value.
    pub fn from_u32(kind: u32) -> Option<Self> {
        match kind {
            1 => Some(FrameKind::Request),
            2 => Some(FrameKind::Abort),
            3 => Some(FrameKind::Reply),
            4 => Some(FrameKind::Finished),
            5 => Some(FrameKind::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FrameKind::Request => "REQUEST",
            FrameKind::Abort => "ABORT",
            FrameKind::Reply => "REPLY",
            FrameKind::Finished => "FINISHED",
            FrameKind::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request this frame belongs to.
    pub request_id: RequestId,
    /// What the frame means.
    pub kind: FrameKind,
    /// Encoded value, empty for ABORT/FINISHED/FAILED.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame.
    pub fn new(request_id: RequestId, kind: FrameKind, payload: Vec<u8>) -> Self {
        Self {
            request_id,
            kind,
            payload,
        }
    }

    /// Build the terminal frame for a request.
    pub fn finished(request_id: RequestId, is_error: bool) -> Self {
        let kind = if is_error {
            FrameKind::Failed
        } else {
            FrameKind::Finished
        };
        Self::new(request_id, kind, Vec::new())
    }

    /// Encode this frame for the wire.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if the payload exceeds MAX_PAYLOAD_SIZE.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serialize_frame(self.request_id, self.kind, &self.payload)
    }
}

/// Frame header for wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame size including header.
    pub length: u32,
    /// CRC32C checksum of (request_id + kind + payload).
    pub checksum: u32,
    /// Request identifier.
    pub request_id: RequestId,
    /// Raw kind value (validated after checksum verification).
    pub kind: u32,
}

impl FrameHeader {
    /// Serialize header into buffer (must be at least HEADER_SIZE bytes).
    pub fn serialize_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8..12].copy_from_slice(&self.request_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.kind.to_le_bytes());
    }

    /// Deserialize header from buffer.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` if buffer is smaller than HEADER_SIZE.
    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        }

        Ok(Self {
            length: read_u32(buf, 0),
            checksum: read_u32(buf, 4),
            request_id: read_u32(buf, 8),
            kind: read_u32(buf, 12),
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Compute CRC32C checksum over request_id + kind + payload.
fn compute_checksum(request_id: RequestId, kind: u32, payload: &[u8]) -> u32 {
    let mut head = [0u8; 8];
    head[0..4].copy_from_slice(&request_id.to_le_bytes());
    head[4..8].copy_from_slice(&kind.to_le_bytes());
    let crc = crc32c::crc32c(&head);
    crc32c::crc32c_append(crc, payload)
}

/// Serialize a frame.
///
/// Returns: `[length:4][checksum:4][request_id:4][kind:4][payload:N]`
///
/// # Errors
///
/// Returns `FrameTooLarge` if payload exceeds MAX_PAYLOAD_SIZE.
///
/// # Examples
///
/// ```
/// use reqlink_transport::{FrameKind, serialize_frame, try_deserialize_frame};
///
/// let bytes = serialize_frame(7, FrameKind::Request, b"{}").expect("serialize");
/// let (frame, consumed) = try_deserialize_frame(&bytes)
///     .expect("valid")
///     .expect("complete");
///
/// assert_eq!(frame.request_id, 7);
/// assert_eq!(frame.kind, FrameKind::Request);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn serialize_frame(
    request_id: RequestId,
    kind: FrameKind,
    payload: &[u8],
) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
        });
    }

    let total_length = HEADER_SIZE + payload.len();
    let mut data = vec![0u8; total_length];

    let header = FrameHeader {
        length: total_length as u32,
        checksum: compute_checksum(request_id, kind.as_u32(), payload),
        request_id,
        kind: kind.as_u32(),
    };

    header.serialize_into(&mut data[..HEADER_SIZE]);
    data[HEADER_SIZE..].copy_from_slice(payload);

    Ok(data)
}

/// Try to deserialize one frame from a buffer that may hold partial data.
///
/// # Returns
///
/// - `Ok(Some((frame, consumed)))` if a complete frame was parsed
/// - `Ok(None)` if more data is needed (not an error condition)
/// - `Err` if data is malformed
pub fn try_deserialize_frame(data: &[u8]) -> Result<Option<(Frame, usize)>, WireError> {
    if data.len() < HEADER_SIZE {
        return Ok(None);
    }

    let header = FrameHeader::deserialize(data)?;

    if header.length < HEADER_SIZE as u32 {
        return Err(WireError::InvalidLength {
            length: header.length,
        });
    }

    let expected_len = header.length as usize;
    if expected_len - HEADER_SIZE > MAX_PAYLOAD_SIZE {
        return Err(WireError::FrameTooLarge {
            size: expected_len - HEADER_SIZE,
        });
    }
    if data.len() < expected_len {
        return Ok(None);
    }

    let payload = &data[HEADER_SIZE..expected_len];

    let computed = compute_checksum(header.request_id, header.kind, payload);
    if computed != header.checksum {
        return Err(WireError::ChecksumMismatch {
            expected: header.checksum,
            actual: computed,
        });
    }

    let kind =
        FrameKind::from_u32(header.kind).ok_or(WireError::UnknownKind { kind: header.kind })?;

    Ok(Some((
        Frame::new(header.request_id, kind, payload.to_vec()),
        expected_len,
    )))
}
