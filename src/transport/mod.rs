//! Transport layer for device communication.
//!
//! This module provides the abstraction over the physical link to the PCV.
//! Currently only USB bulk transfers are implemented.

pub mod usb;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::protocol::FRAME_LEN;

/// Trait for device transport implementations.
///
/// Transfers are fixed 64-byte frames in both directions. A
/// [`Error::TransportLost`](crate::Error::TransportLost) from `send` or
/// `receive` means the device is gone and the link must reconnect; any
/// other error is a transient fault local to one transfer.
pub trait DeviceTransport: Send {
    /// Opens the physical connection to the device.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Closes the physical connection.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Sends one 64-byte frame to the device.
    fn send(&mut self, frame: [u8; FRAME_LEN])
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Receives one 64-byte frame from the device.
    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Result<[u8; FRAME_LEN]>> + Send + '_>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

pub use usb::UsbTransport;
