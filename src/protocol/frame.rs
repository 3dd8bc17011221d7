//! Frame encoding and decoding for the PCV protocol.
//!
//! Every transfer in both directions is exactly 64 bytes, little-endian:
//! ```text
//! ┌────────────┬────────────┬──────────────┬─────────────────────┐
//! │  id (LE)   │  command   │ payload len  │  payload + padding  │
//! │  4 bytes   │  2 bytes   │   2 bytes    │      56 bytes       │
//! └────────────┴────────────┴──────────────┴─────────────────────┘
//! ```
//! Padding past the declared payload length is zero-filled on write and
//! ignored on read.

use std::fmt;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};

use crate::error::FrameError;
use crate::protocol::{Command, IdSource};

/// Total frame length on the wire.
pub const FRAME_LEN: usize = 64;

/// Frame header length (id + command + payload length).
pub const HEADER_LEN: usize = 8;

/// Maximum logical payload length.
pub const MAX_PAYLOAD_LEN: usize = FRAME_LEN - HEADER_LEN;

/// Payload of a `GetChannelStatus` request.
///
/// Captured from the vendor application; asks the device for the
/// real-time channel block (RPM, throttle, speed, gear...).
pub const STATUS_REQUEST_PAYLOAD: [u8; 15] = [
    0x1b, 0x1c, 0x2a, 0x2e, 0xc5, 0x8f, 0xc3, 0x1d, 0x1f, 0x8e, 0xe0, 0x00, 0x00, 0x00, 0x00,
];

/// Direction a frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From host to device (a request).
    Host,
    /// From device to host (a response or unsolicited frame).
    Device,
}

/// A single 64-byte PCV frame.
///
/// Immutable once constructed. Built either for transmission via
/// [`Frame::request`] (fresh correlation id) or from received bytes via
/// [`Frame::from_wire`].
#[derive(Clone)]
pub struct Frame {
    data: [u8; FRAME_LEN],
    direction: Direction,
    timestamp: DateTime<Utc>,
}

impl Frame {
    /// Builds a request frame with a fresh correlation id.
    ///
    /// Writes the id into bytes 0-3, the command code into bytes 4-5, the
    /// payload length into bytes 6-7, the payload from byte 8 and
    /// zero-fills the remainder.
    ///
    /// # Panics
    ///
    /// Panics if the payload exceeds [`MAX_PAYLOAD_LEN`]. Oversized
    /// payloads are a programmer error, not a runtime condition.
    #[must_use]
    pub fn request(
        command: Command,
        payload: &[u8],
        ids: &mut dyn IdSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        assert!(
            payload.len() <= MAX_PAYLOAD_LEN,
            "payload exceeds maximum frame payload"
        );

        let mut buf = BytesMut::with_capacity(FRAME_LEN);
        buf.put_u32_le(ids.next_id());
        buf.put_u16_le(command.code());
        // length checked above, always fits in u16
        buf.put_u16_le(payload.len() as u16);
        buf.put_slice(payload);
        buf.resize(FRAME_LEN, 0);

        let mut data = [0u8; FRAME_LEN];
        data.copy_from_slice(&buf);

        Self {
            data,
            direction: Direction::Host,
            timestamp,
        }
    }

    /// Builds the canonical channel-status request frame.
    #[must_use]
    pub fn status_request(ids: &mut dyn IdSource, timestamp: DateTime<Utc>) -> Self {
        Self::request(
            Command::GetChannelStatus,
            &STATUS_REQUEST_PAYLOAD,
            ids,
            timestamp,
        )
    }

    /// Decodes a frame received from the device.
    #[must_use]
    pub fn from_wire(raw: &[u8; FRAME_LEN], timestamp: DateTime<Utc>) -> Self {
        Self {
            data: *raw,
            direction: Direction::Device,
            timestamp,
        }
    }

    /// Decodes a frame from a byte slice, e.g. out of a bus capture.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::WrongLength`] unless the slice is exactly 64
    /// bytes.
    pub fn parse(
        bytes: &[u8],
        direction: Direction,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, FrameError> {
        let data: [u8; FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| FrameError::WrongLength(bytes.len()))?;
        Ok(Self {
            data,
            direction,
            timestamp,
        })
    }

    /// Returns the correlation id.
    ///
    /// The device echoes the id of a request in its response, so equal ids
    /// match a response to the request that caused it.
    #[must_use]
    pub fn id(&self) -> u32 {
        u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }

    /// Returns the decoded command.
    ///
    /// Unknown command codes decode to [`Command::Invalid`].
    #[must_use]
    pub fn command(&self) -> Command {
        Command::from_code(u16::from_le_bytes([self.data[4], self.data[5]]))
    }

    /// Returns the logical payload length.
    ///
    /// The declared length is clamped to [`MAX_PAYLOAD_LEN`]; the device
    /// never legitimately declares more, and trusting a larger value would
    /// read into bytes that do not exist.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        let declared = u16::from_le_bytes([self.data[6], self.data[7]]) as usize;
        declared.min(MAX_PAYLOAD_LEN)
    }

    /// Returns the payload bytes (excluding padding).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LEN..HEADER_LEN + self.payload_len()]
    }

    /// Joins `len` payload bytes starting at `start` into an unsigned
    /// integer, little-endian.
    ///
    /// # Panics
    ///
    /// Panics if the range reaches past the payload or is wider than
    /// 8 bytes. Out-of-range reads are a contract violation to be guarded
    /// by the caller.
    #[must_use]
    pub fn fragment(&self, start: usize, len: usize) -> u64 {
        assert!(len <= 8, "fragment wider than u64");
        assert!(
            start + len <= self.payload_len(),
            "fragment out of payload bounds"
        );

        let payload = self.payload();
        let mut out = 0u64;
        for (i, &byte) in payload[start..start + len].iter().enumerate() {
            out |= u64::from(byte) << (i * 8);
        }
        out
    }

    /// Joins the whole payload into an unsigned integer, little-endian.
    ///
    /// Payloads longer than 8 bytes are truncated to the first 8.
    #[must_use]
    pub fn payload_as_u64(&self) -> u64 {
        self.fragment(0, self.payload_len().min(8))
    }

    /// Returns the direction this frame travelled.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the capture timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the raw 64-byte wire representation.
    #[must_use]
    pub const fn as_wire(&self) -> &[u8; FRAME_LEN] {
        &self.data
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Host => "D",
            Direction::Device => "U",
        };
        write!(f, "[{dir}] [")?;
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        write!(f, "] @ {}", self.timestamp)
    }
}
