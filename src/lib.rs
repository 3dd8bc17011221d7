//! # pcv-bridge
//!
//! Telemetry bridge for the Dynojet Power Commander V.
//!
//! Polls engine state over USB at a fixed interval and streams the
//! extracted readings to an MQTT broker over mutually-authenticated TLS.
//! Built to stay alive when either side is unavailable: both the device
//! link and the broker session reconnect on their own, and the two
//! bounded queues between the pipeline stages drop the oldest entries
//! under sustained backpressure instead of blocking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pcv_bridge::{Bridge, BridgeConfig, BrokerConfig, TlsPaths};
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = BrokerConfig::new(
//!         "data.iot.eu-west-1.amazonaws.com",
//!         "KTMDuke390",
//!         TlsPaths::new("rootCA.crt", "cert.pem", "privkey.pem"),
//!     );
//!
//!     let handle = Bridge::new(BridgeConfig::new(broker)).spawn();
//!     handle.join().await;
//! }
//! ```
//!
//! ## Architecture
//!
//! Three independent tasks, connected only through two evicting queues:
//!
//! ```text
//! Device ──▶ DeviceLink ──▶ [frames] ──▶ Translator ──▶ [readings] ──▶ Forwarder ──▶ Broker
//! ```
//!
//! - [`protocol`] - 64-byte frame codec and command opcodes
//! - [`queue`] - bounded evicting queue shared between stages
//! - [`transport`] - USB bulk transport to the device
//! - [`link`] - device polling with reconnect
//! - [`translator`] - frame-to-reading transform
//! - [`session`] - MQTT/TLS session to the broker
//! - [`forwarder`] - queue draining with reconnect
//! - [`bridge`] - pipeline wiring

pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod link;
pub mod protocol;
pub mod queue;
pub mod reading;
pub mod session;
pub mod state;
pub mod translator;
pub mod transport;

// Re-exports for convenience
pub use bridge::{Bridge, BridgeHandle};
pub use clock::{Clock, SystemClock};
pub use config::{BridgeConfig, BrokerConfig, ReconnectPolicy, TlsPaths};
pub use error::{Error, FrameError, Result};
pub use forwarder::Forwarder;
pub use link::DeviceLink;
pub use protocol::{Command, Direction, Frame, IdSource, RandomIdSource};
pub use queue::EvictingQueue;
pub use reading::Reading;
pub use session::{BrokerSession, MqttSession};
pub use state::ConnectionState;
pub use translator::Translator;
pub use transport::{DeviceTransport, UsbTransport};
