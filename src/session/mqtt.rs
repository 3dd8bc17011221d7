//! MQTT session implementation.
//!
//! Maintains a mutually-authenticated TLS session to the broker. A
//! background task drives the rumqttc event loop and tracks two pieces of
//! shared state: the connected flag (set on `ConnAck`, cleared on any
//! connection error or broker-initiated disconnect) and a delivery counter
//! advanced on every `PubAck`. [`MqttSession::publish`] resolves only once
//! the counter moves past the value it saw before sending, so a resolved
//! publish means the broker acknowledged the message, not merely that it
//! was queued on the client. When the event loop dies the forwarder
//! observes `NotConnected` and rebuilds the whole session through
//! [`MqttSession::connect`].
//!
//! The session carries one in-flight publish at a time; the forwarder
//! publishes serially.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::BrokerConfig;
use crate::error::{Error, Result};
use crate::session::BrokerSession;

/// Capacity of the rumqttc request channel.
const REQUEST_CAPACITY: usize = 64;

/// MQTT session over TLS with mutual authentication.
pub struct MqttSession {
    config: BrokerConfig,
    client: Option<AsyncClient>,
    connected: Arc<AtomicBool>,
    acks: Option<watch::Receiver<u64>>,
    event_task: Option<JoinHandle<()>>,
}

/// Applies one event-loop result to the shared session state.
///
/// Returns `false` when the event loop must stop. The ack sender is
/// dropped with the stopped task, which wakes any publish still waiting
/// for its acknowledgment.
fn apply_event(
    result: std::result::Result<Event, rumqttc::ConnectionError>,
    connected: &AtomicBool,
    acks: &watch::Sender<u64>,
) -> bool {
    match result {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
            tracing::info!("broker session established");
            connected.store(true, Ordering::SeqCst);
            true
        }
        Ok(Event::Incoming(Packet::PubAck(_))) => {
            acks.send_modify(|n| *n += 1);
            true
        }
        Ok(Event::Incoming(Packet::Disconnect)) => {
            tracing::info!("broker closed the session");
            connected.store(false, Ordering::SeqCst);
            false
        }
        Ok(event) => {
            tracing::trace!("broker event: {:?}", event);
            true
        }
        Err(e) => {
            tracing::debug!("broker connection error: {}", e);
            connected.store(false, Ordering::SeqCst);
            false
        }
    }
}

impl MqttSession {
    /// Creates a new, unconnected session for the given broker.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            acks: None,
            event_task: None,
        }
    }

    /// Loads the TLS credential files and builds the transport config.
    fn tls_transport(&self) -> Result<Transport> {
        let ca = std::fs::read(&self.config.tls.root_ca)?;
        let client_cert = std::fs::read(&self.config.tls.client_cert)?;
        let private_key = std::fs::read(&self.config.tls.private_key)?;

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((client_cert, private_key)),
        }))
    }
}

impl BrokerSession for MqttSession {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            // tear down any previous session
            if let Some(task) = self.event_task.take() {
                task.abort();
            }
            self.client = None;
            self.acks = None;
            self.connected.store(false, Ordering::SeqCst);

            tracing::info!(
                "trying to establish broker session to {}:{}",
                self.config.host,
                self.config.port
            );

            let mut options = MqttOptions::new(
                self.config.client_id.clone(),
                self.config.host.clone(),
                self.config.port,
            );
            options.set_clean_session(true);
            options.set_transport(self.tls_transport()?);

            let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
            let connected = Arc::clone(&self.connected);
            let (ack_tx, ack_rx) = watch::channel(0u64);

            let task = tokio::spawn(async move {
                loop {
                    if !apply_event(event_loop.poll().await, &connected, &ack_tx) {
                        return;
                    }
                }
            });

            self.event_task = Some(task);
            self.client = Some(client);
            self.acks = Some(ack_rx);
            Ok(())
        })
    }

    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(Error::NotConnected);
            }
            let client = self.client.as_ref().ok_or(Error::NotConnected)?;
            let acks = self.acks.as_mut().ok_or(Error::NotConnected)?;

            let before = *acks.borrow_and_update();
            client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await?;

            // resolve only once the broker has acknowledged; losing the
            // event loop mid-flight is a session loss, not a success
            loop {
                if *acks.borrow_and_update() > before {
                    return Ok(());
                }
                if acks.changed().await.is_err() {
                    return Err(Error::NotConnected);
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsPaths;
    use rumqttc::mqttbytes::v4::{ConnAck, ConnectReturnCode, PubAck};
    use std::time::Duration;
    use tokio::time::timeout;

    fn broker_config() -> BrokerConfig {
        BrokerConfig::new(
            "broker.example.com",
            "test-client",
            TlsPaths::new("ca.crt", "cert.pem", "key.pem"),
        )
    }

    fn shared_state() -> (Arc<AtomicBool>, watch::Sender<u64>, watch::Receiver<u64>) {
        let (ack_tx, ack_rx) = watch::channel(0u64);
        (Arc::new(AtomicBool::new(false)), ack_tx, ack_rx)
    }

    /// Session wired to a live client whose event loop is held by the
    /// test instead of a background task.
    fn detached_session() -> (MqttSession, watch::Sender<u64>, rumqttc::EventLoop) {
        let (client, event_loop) = AsyncClient::new(
            MqttOptions::new("test-client", "broker.example.com", 8883),
            REQUEST_CAPACITY,
        );
        let (ack_tx, ack_rx) = watch::channel(0u64);
        let session = MqttSession {
            config: broker_config(),
            client: Some(client),
            connected: Arc::new(AtomicBool::new(true)),
            acks: Some(ack_rx),
            event_task: None,
        };
        (session, ack_tx, event_loop)
    }

    #[test]
    fn test_connack_sets_connected() {
        let (connected, ack_tx, _ack_rx) = shared_state();
        let keep_running = apply_event(
            Ok(Event::Incoming(Packet::ConnAck(ConnAck {
                session_present: false,
                code: ConnectReturnCode::Success,
            }))),
            &connected,
            &ack_tx,
        );
        assert!(keep_running);
        assert!(connected.load(Ordering::SeqCst));
    }

    #[test]
    fn test_connection_error_clears_connected_and_stops() {
        let (connected, ack_tx, _ack_rx) = shared_state();
        connected.store(true, Ordering::SeqCst);
        let keep_running = apply_event(
            Err(rumqttc::ConnectionError::Io(std::io::Error::other(
                "connection reset",
            ))),
            &connected,
            &ack_tx,
        );
        assert!(!keep_running);
        assert!(!connected.load(Ordering::SeqCst));
    }

    #[test]
    fn test_broker_disconnect_clears_connected_and_stops() {
        let (connected, ack_tx, _ack_rx) = shared_state();
        connected.store(true, Ordering::SeqCst);
        let keep_running = apply_event(
            Ok(Event::Incoming(Packet::Disconnect)),
            &connected,
            &ack_tx,
        );
        assert!(!keep_running);
        assert!(!connected.load(Ordering::SeqCst));
    }

    #[test]
    fn test_puback_advances_delivery_counter() {
        let (connected, ack_tx, ack_rx) = shared_state();
        connected.store(true, Ordering::SeqCst);
        let keep_running = apply_event(
            Ok(Event::Incoming(Packet::PubAck(PubAck { pkid: 1 }))),
            &connected,
            &ack_tx,
        );
        assert!(keep_running);
        assert_eq!(*ack_rx.borrow(), 1);
        assert!(connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_publish_resolves_only_after_ack() {
        let (mut session, ack_tx, _event_loop) = detached_session();

        let mut publish = session.publish("RPM", b"{}".to_vec());
        // no acknowledgment yet: the publish must still be pending
        assert!(
            timeout(Duration::from_millis(20), &mut publish)
                .await
                .is_err()
        );

        ack_tx.send_modify(|n| *n += 1);
        let result = timeout(Duration::from_millis(100), publish)
            .await
            .expect("publish resolves after the ack");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_fails_when_session_dies_mid_flight() {
        let (mut session, ack_tx, _event_loop) = detached_session();

        let mut publish = session.publish("RPM", b"{}".to_vec());
        assert!(
            timeout(Duration::from_millis(20), &mut publish)
                .await
                .is_err()
        );

        // the event-loop task is gone: the ack channel closes without an
        // acknowledgment, so the caller keeps the reading queued
        drop(ack_tx);
        let result = timeout(Duration::from_millis(100), publish)
            .await
            .expect("publish resolves on session loss");
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_publish_without_session() {
        let mut session = MqttSession::new(broker_config());
        assert!(!session.is_connected());

        let err = session.publish("RPM", b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_fails_without_credentials() {
        let config = BrokerConfig::new(
            "broker.example.com",
            "test-client",
            TlsPaths::new(
                "/nonexistent/ca.crt",
                "/nonexistent/cert.pem",
                "/nonexistent/key.pem",
            ),
        );
        let mut session = MqttSession::new(config);
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!session.is_connected());
    }
}
