//! Named, timestamped readings extracted from channel-status payloads.
//!
//! The status payload carries a block of engine values at fixed offsets.
//! Two are extracted here:
//!
//! - RPM: 2 bytes little-endian at payload offset 1. In the payload
//!   `[01 9C 11 C5 ...]` the value lives in `9C 11`; reversing the bytes
//!   (0x119C) gives 4508.
//! - Throttle: 2 bytes little-endian at payload offset 9, range 1-1000.
//!   `95 01` reversed (0x0195) gives 405.
//!
//! Extraction is a pure function of the payload bytes; the source frame is
//! not mutated or retained.

use chrono::{DateTime, Utc};

use crate::protocol::Frame;

/// Broker timestamp format: `YYYY-MM-DDThh:mm:ssZ`, UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Payload offset of the RPM field.
const RPM_OFFSET: usize = 1;

/// Payload offset of the throttle field.
const THROTTLE_OFFSET: usize = 9;

/// Width in bytes of each extracted field.
const FIELD_LEN: usize = 2;

/// Minimum payload length a frame needs to carry both fields.
pub const MIN_STATUS_PAYLOAD_LEN: usize = THROTTLE_OFFSET + FIELD_LEN;

/// A named scalar captured at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Reading name; doubles as the broker topic.
    pub name: &'static str,
    /// Extracted value.
    pub value: u64,
    /// Capture time of the source frame.
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Extracts the engine speed reading from a status-response frame.
    ///
    /// # Panics
    ///
    /// Panics if the frame's payload is shorter than
    /// [`MIN_STATUS_PAYLOAD_LEN`]; callers guard with [`carries_readings`].
    #[must_use]
    pub fn rpm(frame: &Frame) -> Self {
        Self {
            name: "RPM",
            value: frame.fragment(RPM_OFFSET, FIELD_LEN),
            timestamp: frame.timestamp(),
        }
    }

    /// Extracts the throttle position reading from a status-response frame.
    ///
    /// # Panics
    ///
    /// Panics if the frame's payload is shorter than
    /// [`MIN_STATUS_PAYLOAD_LEN`]; callers guard with [`carries_readings`].
    #[must_use]
    pub fn throttle(frame: &Frame) -> Self {
        Self {
            name: "Throttle",
            value: frame.fragment(THROTTLE_OFFSET, FIELD_LEN),
            timestamp: frame.timestamp(),
        }
    }

    /// Serializes the reading into the broker publish message.
    ///
    /// A JSON object with exactly three string-valued keys:
    /// `{"type": ..., "value": ..., "timestamp": ...}`.
    #[must_use]
    pub fn to_message(&self) -> String {
        serde_json::json!({
            "type": self.name,
            "value": self.value.to_string(),
            "timestamp": self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        })
        .to_string()
    }
}

/// Returns true if the frame can yield the full set of readings.
///
/// Unmatched frames forwarded by the link (`CanPass` chatter, short
/// payloads) carry no channel-status block and are skipped whole; a frame
/// either yields both readings or none.
#[must_use]
pub fn carries_readings(frame: &Frame) -> bool {
    frame.command() == crate::protocol::Command::GetChannelStatus
        && frame.payload_len() >= MIN_STATUS_PAYLOAD_LEN
}
