//! Telemetry translator.
//!
//! Drains decoded frames from the frame queue and emits the canonical
//! readings into the reading queue. Stateless per iteration; no reconnect
//! logic, purely a queue-to-queue transform.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::Frame;
use crate::queue::EvictingQueue;
use crate::reading::{Reading, carries_readings};

/// Extracts the canonical readings from one status-response frame.
///
/// Returns `None` for frames that carry no channel-status block
/// (`CanPass` chatter, short payloads). A frame yields either both
/// readings or none, never a partial set.
#[must_use]
pub fn translate(frame: &Frame) -> Option<[Reading; 2]> {
    if !carries_readings(frame) {
        return None;
    }
    Some([Reading::rpm(frame), Reading::throttle(frame)])
}

/// Moves frames from the frame queue into the reading queue.
pub struct Translator {
    frames: Arc<EvictingQueue<Frame>>,
    readings: Arc<EvictingQueue<Reading>>,
    idle_wait: Duration,
}

impl Translator {
    /// Creates a new translator between the two queues.
    #[must_use]
    pub fn new(
        frames: Arc<EvictingQueue<Frame>>,
        readings: Arc<EvictingQueue<Reading>>,
        idle_wait: Duration,
    ) -> Self {
        Self {
            frames,
            readings,
            idle_wait,
        }
    }

    /// Runs the translator for the lifetime of the process.
    pub async fn run(self) {
        loop {
            if let Some(frame) = self.frames.pop() {
                match translate(&frame) {
                    Some(readings) => {
                        for reading in readings {
                            self.readings.push(reading);
                        }
                    }
                    None => {
                        tracing::debug!("skipping frame without status block: {:?}", frame);
                    }
                }
            } else {
                tokio::time::sleep(self.idle_wait).await;
            }
        }
    }
}
