//! Broker forwarder.
//!
//! Owns the broker session and drains the reading queue. The state
//! machine mirrors the device link: an outer reconnect loop with fixed
//! backoff, and an inner publish loop while the session is up.
//!
//! The publish loop peeks the head of the queue, publishes, and only pops
//! after the publish succeeded, so a reading interrupted by session loss
//! stays queued and is retried after reconnection. A reading evicted by
//! queue pressure before it was published is silently lost; that is the
//! designed backpressure behavior, not an error.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ReconnectPolicy;
use crate::error::Error;
use crate::queue::EvictingQueue;
use crate::reading::Reading;
use crate::session::BrokerSession;
use crate::state::ConnectionState;

/// Publishes queued readings to the broker in FIFO order.
pub struct Forwarder<S> {
    session: S,
    readings: Arc<EvictingQueue<Reading>>,
    policy: ReconnectPolicy,
    idle_wait: Duration,
    state: ConnectionState,
}

impl<S: BrokerSession> Forwarder<S> {
    /// Creates a new forwarder draining the given queue.
    #[must_use]
    pub fn new(
        session: S,
        readings: Arc<EvictingQueue<Reading>>,
        policy: ReconnectPolicy,
        idle_wait: Duration,
    ) -> Self {
        Self {
            session,
            readings,
            policy,
            idle_wait,
            state: ConnectionState::Disconnected,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the forwarder for the lifetime of the process.
    pub async fn run(mut self) {
        loop {
            self.establish().await;
            self.drain_until_lost().await;
        }
    }

    /// Keeps attempting session establishment until the session reports
    /// itself connected.
    async fn establish(&mut self) {
        self.state = ConnectionState::Connecting;
        loop {
            if let Err(e) = self.session.connect().await {
                tracing::debug!("failed to connect to broker: {}", e);
            }
            self.policy.wait().await;
            if self.session.is_connected() {
                self.state = ConnectionState::Connected;
                return;
            }
        }
    }

    /// Publishes queue entries in order until the session is lost.
    async fn drain_until_lost(&mut self) {
        while self.state == ConnectionState::Connected {
            let Some(reading) = self.readings.peek() else {
                tokio::time::sleep(self.idle_wait).await;
                continue;
            };

            match self
                .session
                .publish(reading.name, reading.to_message().into_bytes())
                .await
            {
                Ok(()) => {
                    self.readings.pop();
                    tracing::debug!("published {} {}", reading.name, reading.value);
                }
                Err(Error::NotConnected) => {
                    tracing::info!("broker session lost");
                    self.state = ConnectionState::Disconnected;
                }
                Err(e) => {
                    // transient publish fault; the same reading is still at
                    // the head and will be retried next iteration
                    tracing::warn!("publish error: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    fn reading(name: &'static str, value: u64) -> Reading {
        Reading {
            name,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Scripted session: needs `attempts_to_connect` connect calls before
    /// reporting connected, then accepts `publishes_before_loss` publishes
    /// before the session drops.
    struct ScriptedSession {
        attempts_to_connect: usize,
        attempts: usize,
        connected: bool,
        publishes_before_loss: usize,
        published: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ScriptedSession {
        fn new(attempts_to_connect: usize, publishes_before_loss: usize) -> Self {
            Self {
                attempts_to_connect,
                attempts: 0,
                connected: false,
                publishes_before_loss,
                published: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl BrokerSession for ScriptedSession {
        fn connect(&mut self) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.attempts += 1;
                if self.attempts >= self.attempts_to_connect {
                    self.connected = true;
                }
                Ok(())
            })
        }

        fn publish<'a>(
            &'a mut self,
            topic: &'a str,
            payload: Vec<u8>,
        ) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                let mut published = self.published.lock().unwrap();
                if published.len() >= self.publishes_before_loss {
                    self.connected = false;
                    return Err(Error::NotConnected);
                }
                published.push((topic.to_owned(), String::from_utf8(payload).unwrap()));
                Ok(())
            })
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn forwarder_with(
        session: ScriptedSession,
        readings: Arc<EvictingQueue<Reading>>,
    ) -> Forwarder<ScriptedSession> {
        Forwarder::new(
            session,
            readings,
            ReconnectPolicy::fixed(Duration::from_millis(1)),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_establish_converges() {
        let readings = Arc::new(EvictingQueue::new(8));
        let mut forwarder = forwarder_with(ScriptedSession::new(4, 0), readings);
        assert_eq!(forwarder.state(), ConnectionState::Disconnected);

        forwarder.establish().await;
        assert_eq!(forwarder.state(), ConnectionState::Connected);
        assert_eq!(forwarder.session.attempts, 4);
    }

    #[tokio::test]
    async fn test_publishes_in_fifo_order() {
        let readings = Arc::new(EvictingQueue::new(8));
        readings.push(reading("RPM", 4508));
        readings.push(reading("Throttle", 405));

        let session = ScriptedSession::new(1, 2);
        let published = Arc::clone(&session.published);
        let mut forwarder = forwarder_with(session, Arc::clone(&readings));

        forwarder.establish().await;
        forwarder.drain_until_lost().await;

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "RPM");
        assert!(published[0].1.contains("\"value\":\"4508\""));
        assert_eq!(published[1].0, "Throttle");
        assert!(readings.is_empty());
    }

    #[tokio::test]
    async fn test_unpublished_reading_stays_at_head() {
        let readings = Arc::new(EvictingQueue::new(8));
        readings.push(reading("RPM", 4508));

        // session drops before any publish goes through
        let session = ScriptedSession::new(1, 0);
        let mut forwarder = forwarder_with(session, Arc::clone(&readings));

        forwarder.establish().await;
        forwarder.drain_until_lost().await;

        assert_eq!(forwarder.state(), ConnectionState::Disconnected);
        // the reading was not popped and will be retried after reconnect
        assert_eq!(readings.len(), 1);
        assert_eq!(readings.peek().unwrap().value, 4508);
    }

    #[tokio::test]
    async fn test_loss_under_pressure() {
        let readings = Arc::new(EvictingQueue::new(3));
        for value in 0..3 {
            readings.push(reading("RPM", value));
        }

        // forwarder is disconnected; one more reading arrives
        readings.push(reading("RPM", 99));

        assert_eq!(readings.len(), readings.capacity());
        // the oldest reading is gone
        assert_eq!(readings.peek().unwrap().value, 1);
    }
}
