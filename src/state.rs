//! Connection state shared by the two reconnecting pipeline stages.

/// State of a reconnect-capable connection.
///
/// Both the device link and the broker forwarder cycle through
/// `Disconnected → Connecting → Connected` and fall back to
/// `Disconnected` on transport loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; the owner will start a connection attempt.
    Disconnected,
    /// Repeatedly attempting to establish the connection.
    Connecting,
    /// Connection is up; the owner runs its work loop.
    Connected,
}
