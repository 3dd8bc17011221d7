//! Configuration for the bridge pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// Default poll interval for device status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of each pipeline queue.
///
/// At the default poll interval this buffers a broker outage of roughly
/// 100-200 seconds before readings start getting evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2000;

/// Default idle wait when a consumer finds its queue empty.
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Default MQTT broker port (TLS).
pub const DEFAULT_BROKER_PORT: u16 = 8883;

/// Fixed-interval reconnect backoff.
///
/// Both reconnect loops wait this long between attempts, with no
/// exponential growth. Injectable so tests can run many reconnect cycles
/// without real delays.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl ReconnectPolicy {
    /// Creates a policy with a fixed delay between attempts.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Returns the delay between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits out one backoff interval.
    pub async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2))
    }
}

/// File paths for the broker's mutual-TLS material.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    /// Root CA certificate (PEM).
    pub root_ca: PathBuf,
    /// Client certificate (PEM).
    pub client_cert: PathBuf,
    /// Client private key (PEM).
    pub private_key: PathBuf,
}

impl TlsPaths {
    /// Creates TLS paths from the three credential files.
    #[must_use]
    pub fn new(
        root_ca: impl Into<PathBuf>,
        client_cert: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root_ca: root_ca.into(),
            client_cert: client_cert.into(),
            private_key: private_key.into(),
        }
    }
}

/// Broker endpoint configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Mutual-TLS credential paths.
    pub tls: TlsPaths,
}

impl BrokerConfig {
    /// Creates a broker configuration with the default TLS port.
    #[must_use]
    pub fn new(host: impl Into<String>, client_id: impl Into<String>, tls: TlsPaths) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_BROKER_PORT,
            client_id: client_id.into(),
            tls,
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Configuration for the whole bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How often to request fresh values from the device.
    pub poll_interval: Duration,
    /// Capacity of each of the two pipeline queues.
    pub queue_capacity: usize,
    /// Idle wait used by consumers when their queue is empty.
    pub idle_wait: Duration,
    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectPolicy,
    /// Broker endpoint.
    pub broker: BrokerConfig,
}

impl BridgeConfig {
    /// Creates a bridge configuration with default pipeline settings.
    #[must_use]
    pub fn new(broker: BrokerConfig) -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_wait: DEFAULT_IDLE_WAIT,
            reconnect: ReconnectPolicy::default(),
            broker,
        }
    }

    /// Sets the device poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the pipeline queue capacity.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the consumer idle wait.
    #[must_use]
    pub const fn idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    /// Sets the reconnect backoff policy.
    #[must_use]
    pub const fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
