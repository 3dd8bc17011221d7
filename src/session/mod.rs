//! Broker session layer.
//!
//! This module provides the abstraction over the network session to the
//! message broker. Currently only MQTT over TLS is implemented.

pub mod mqtt;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Trait for broker session implementations.
///
/// An [`Error::NotConnected`](crate::Error::NotConnected) from `publish`
/// means the session is down and the forwarder must reconnect; any other
/// error is a transient fault local to one publish.
pub trait BrokerSession: Send {
    /// Starts a session establishment attempt.
    ///
    /// Establishment is asynchronous; callers observe the outcome through
    /// [`BrokerSession::is_connected`] after a backoff interval.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Publishes one message under the given topic.
    ///
    /// Resolves with `Ok` only after the broker has acknowledged
    /// delivery; on any error the caller must treat the message as
    /// undelivered and keep it queued.
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Returns true if the session reports itself connected.
    fn is_connected(&self) -> bool;
}

pub use mqtt::MqttSession;
