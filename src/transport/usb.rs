//! USB bulk transport implementation.
//!
//! The PCV enumerates as vendor 0x10b6 product 0x0502 with one bulk IN and
//! one bulk OUT endpoint on interface 0. Every transfer in either direction
//! is a full 64-byte frame.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};

use crate::error::{Error, Result};
use crate::protocol::FRAME_LEN;
use crate::transport::DeviceTransport;

/// PCV USB vendor id.
pub const VENDOR_ID: u16 = 0x10b6;

/// PCV USB product id.
pub const PRODUCT_ID: u16 = 0x0502;

/// Device-to-host bulk endpoint.
const ENDPOINT_IN: u8 = 0x81;

/// Host-to-device bulk endpoint.
const ENDPOINT_OUT: u8 = 0x01;

/// Claimed interface number.
const INTERFACE: u8 = 0;

/// Default timeout for a single bulk transfer.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Maps a libusb error to the bridge error taxonomy.
///
/// `NoDevice` and `Pipe` mean the device is gone or the endpoint stalled;
/// both drive the link back to reconnecting. Everything else is transient.
fn map_usb_error(err: rusb::Error) -> Error {
    match err {
        rusb::Error::NoDevice | rusb::Error::Pipe => Error::TransportLost,
        other => Error::Usb(other),
    }
}

/// Every transfer must move exactly one frame. A short write leaves the
/// device with a truncated request, a short read leaves the host with a
/// truncated response; neither can be trusted.
fn require_full_transfer(actual: usize) -> Result<()> {
    if actual == FRAME_LEN {
        Ok(())
    } else {
        Err(Error::ShortTransfer {
            expected: FRAME_LEN,
            actual,
        })
    }
}

/// USB transport for PCV communication.
///
/// The libusb calls are blocking; they run on the blocking thread pool so
/// the pipeline tasks are never stalled by a slow transfer.
pub struct UsbTransport {
    handle: Option<Arc<DeviceHandle<GlobalContext>>>,
    timeout: Duration,
}

impl UsbTransport {
    /// Creates a new, unconnected USB transport.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handle: None,
            timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Sets the per-transfer timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn live_handle(&self) -> Result<Arc<DeviceHandle<GlobalContext>>> {
        self.handle.clone().ok_or(Error::NotConnected)
    }
}

impl Default for UsbTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTransport for UsbTransport {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.handle.is_some() {
                return Ok(());
            }

            tracing::debug!(
                "looking for PCV device {:04x}:{:04x}",
                VENDOR_ID,
                PRODUCT_ID
            );

            let handle = tokio::task::spawn_blocking(|| -> Result<DeviceHandle<GlobalContext>> {
                let mut handle = rusb::open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID)
                    .ok_or(Error::DeviceNotFound)?;
                if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
                    tracing::debug!("kernel driver auto-detach not supported: {}", e);
                }
                handle.claim_interface(INTERFACE).map_err(map_usb_error)?;
                Ok(handle)
            })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

            self.handle = Some(Arc::new(handle));
            tracing::info!("USB connection established");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(handle) = self.handle.take() {
                tracing::info!("closing USB connection");
                // releasing the interface is best-effort; the device may
                // already be gone
                let _ = tokio::task::spawn_blocking(move || {
                    if let Ok(mut handle) = Arc::try_unwrap(handle) {
                        let _ = handle.release_interface(INTERFACE);
                    }
                })
                .await;
            }
            Ok(())
        })
    }

    fn send(
        &mut self,
        frame: [u8; FRAME_LEN],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let handle = self.live_handle();
        let timeout = self.timeout;
        Box::pin(async move {
            let handle = handle?;
            let written = tokio::task::spawn_blocking(move || {
                handle
                    .write_bulk(ENDPOINT_OUT, &frame, timeout)
                    .map_err(map_usb_error)
            })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

            require_full_transfer(written)
        })
    }

    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Result<[u8; FRAME_LEN]>> + Send + '_>> {
        let handle = self.live_handle();
        let timeout = self.timeout;
        Box::pin(async move {
            let handle = handle?;
            let frame = tokio::task::spawn_blocking(move || {
                let mut buffer = [0u8; FRAME_LEN];
                let read = handle
                    .read_bulk(ENDPOINT_IN, &mut buffer, timeout)
                    .map_err(map_usb_error)?;
                require_full_transfer(read)?;
                Ok::<_, Error>(buffer)
            })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

            Ok(frame)
        })
    }

    fn is_connected(&self) -> bool {
        self.handle.is_some()
    }
}
