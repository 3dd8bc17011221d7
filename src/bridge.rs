//! Top-level pipeline wiring.
//!
//! Builds the two queues and the three pipeline stages and spawns them as
//! independent tasks. The queues are the only shared state between stages;
//! no stage ever blocks another. There is no graceful shutdown — the
//! stages run for the lifetime of the process.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::clock::SystemClock;
use crate::config::BridgeConfig;
use crate::forwarder::Forwarder;
use crate::link::DeviceLink;
use crate::protocol::{Frame, RandomIdSource};
use crate::queue::EvictingQueue;
use crate::reading::Reading;
use crate::session::{BrokerSession, MqttSession};
use crate::translator::Translator;
use crate::transport::{DeviceTransport, UsbTransport};

/// The device-to-broker telemetry bridge.
pub struct Bridge {
    config: BridgeConfig,
}

/// Handle to a running bridge.
///
/// Holds the task handles and the two queues. Dropping the handle does not
/// stop the tasks; [`BridgeHandle::abort`] does.
pub struct BridgeHandle {
    link: JoinHandle<()>,
    translator: JoinHandle<()>,
    forwarder: JoinHandle<()>,
    frames: Arc<EvictingQueue<Frame>>,
    readings: Arc<EvictingQueue<Reading>>,
}

impl Bridge {
    /// Creates a bridge from the given configuration.
    #[must_use]
    pub const fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Spawns the pipeline against the real USB device and MQTT broker.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> BridgeHandle {
        let session = MqttSession::new(self.config.broker.clone());
        self.spawn_with(UsbTransport::new(), session)
    }

    /// Spawns the pipeline with custom transport and session
    /// implementations.
    #[must_use]
    pub fn spawn_with<T, S>(self, transport: T, session: S) -> BridgeHandle
    where
        T: DeviceTransport + 'static,
        S: BrokerSession + 'static,
    {
        let frames = Arc::new(EvictingQueue::new(self.config.queue_capacity));
        let readings = Arc::new(EvictingQueue::new(self.config.queue_capacity));

        let link = DeviceLink::new(
            transport,
            Box::new(RandomIdSource::new()),
            Arc::new(SystemClock),
            self.config.reconnect,
            self.config.poll_interval,
            Arc::clone(&frames),
        );
        let translator = Translator::new(
            Arc::clone(&frames),
            Arc::clone(&readings),
            self.config.idle_wait,
        );
        let forwarder = Forwarder::new(
            session,
            Arc::clone(&readings),
            self.config.reconnect,
            self.config.idle_wait,
        );

        BridgeHandle {
            link: tokio::spawn(link.run()),
            translator: tokio::spawn(translator.run()),
            forwarder: tokio::spawn(forwarder.run()),
            frames,
            readings,
        }
    }
}

impl BridgeHandle {
    /// Returns the frame queue between device link and translator.
    #[must_use]
    pub const fn frames(&self) -> &Arc<EvictingQueue<Frame>> {
        &self.frames
    }

    /// Returns the reading queue between translator and forwarder.
    #[must_use]
    pub const fn readings(&self) -> &Arc<EvictingQueue<Reading>> {
        &self.readings
    }

    /// Aborts all three pipeline tasks.
    pub fn abort(&self) {
        self.link.abort();
        self.translator.abort();
        self.forwarder.abort();
    }

    /// Waits until all three tasks have stopped.
    ///
    /// The tasks never finish on their own; this is only meaningful after
    /// [`BridgeHandle::abort`].
    pub async fn join(self) {
        let _ = self.link.await;
        let _ = self.translator.await;
        let _ = self.forwarder.await;
    }
}
