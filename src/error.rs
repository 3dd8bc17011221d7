//! Error types for the pcv-bridge library.

use thiserror::Error;

/// The main error type for bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// USB transfer error that does not indicate a lost device.
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// A bulk transfer moved fewer bytes than a full frame.
    ///
    /// Transient: the poll cycle that saw it is skipped and retried.
    #[error("short USB transfer: {actual} of {expected} bytes")]
    ShortTransfer {
        /// Expected transfer size (one full frame).
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The device transport is gone (unplugged or endpoint stalled).
    ///
    /// Drives the link state machine back to `Disconnected`; recovered by
    /// the reconnect loop, never propagated further.
    #[error("device transport lost")]
    TransportLost,

    /// The PCV device was not found on the bus.
    #[error("PCV device not found")]
    DeviceNotFound,

    /// No session/transport is currently established.
    #[error("not connected")]
    NotConnected,

    /// MQTT client error (publish rejected, client closed).
    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    /// MQTT connection-level error.
    #[error("MQTT connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Raw data is not exactly one 64-byte frame.
    #[error("wrong frame length: expected 64 bytes, got {0}")]
    WrongLength(usize),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
