//! Device link manager.
//!
//! Owns the device transport and feeds the frame queue. Two nested loops:
//! an outer reconnect loop that keeps trying to open the transport with a
//! fixed backoff, and an inner poll loop that requests channel status at a
//! fixed interval while the link is up.
//!
//! While connected the frame queue receives roughly `1000 / poll_ms`
//! frames per second; while disconnected it receives nothing. Consumers
//! must tolerate both silence and unmatched frames.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ReconnectPolicy;
use crate::error::Error;
use crate::protocol::{Frame, IdSource};
use crate::queue::EvictingQueue;
use crate::state::ConnectionState;
use crate::transport::DeviceTransport;

/// How many responses to read looking for a matching correlation id
/// before giving up on the current request.
pub const RECEIVE_RETRY_COUNT: u32 = 20;

/// Polls the device for channel status and pushes responses into the
/// frame queue.
pub struct DeviceLink<T> {
    transport: T,
    ids: Box<dyn IdSource>,
    clock: Arc<dyn Clock>,
    policy: ReconnectPolicy,
    poll_interval: std::time::Duration,
    frames: Arc<EvictingQueue<Frame>>,
    state: ConnectionState,
}

impl<T: DeviceTransport> DeviceLink<T> {
    /// Creates a new link manager.
    #[must_use]
    pub fn new(
        transport: T,
        ids: Box<dyn IdSource>,
        clock: Arc<dyn Clock>,
        policy: ReconnectPolicy,
        poll_interval: std::time::Duration,
        frames: Arc<EvictingQueue<Frame>>,
    ) -> Self {
        Self {
            transport,
            ids,
            clock,
            policy,
            poll_interval,
            frames,
            state: ConnectionState::Disconnected,
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the link for the lifetime of the process.
    ///
    /// Never returns; recovery from transport loss is the reconnect loop,
    /// not an error path.
    pub async fn run(mut self) {
        loop {
            self.establish().await;
            self.poll_until_lost().await;
        }
    }

    /// Keeps attempting to open the transport until it succeeds.
    async fn establish(&mut self) {
        self.state = ConnectionState::Connecting;
        loop {
            match self.transport.connect().await {
                Ok(()) => {
                    tracing::info!("device link established");
                    self.state = ConnectionState::Connected;
                    return;
                }
                Err(e) => {
                    tracing::debug!("failed to establish device link: {}", e);
                }
            }
            self.policy.wait().await;
        }
    }

    /// Polls at the configured interval until the transport is lost.
    async fn poll_until_lost(&mut self) {
        while self.state == ConnectionState::Connected {
            match self.poll_cycle().await {
                Ok(()) => {}
                Err(Error::TransportLost) => {
                    tracing::info!("device link lost");
                    let _ = self.transport.disconnect().await;
                    self.state = ConnectionState::Disconnected;
                    return;
                }
                Err(e) => {
                    // transient fault; skip this cycle and poll again
                    tracing::warn!("device poll error: {}", e);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Sends one status request and reads responses until one matches the
    /// request's correlation id or the retry budget is spent.
    ///
    /// When the budget is spent the last-seen frame is pushed regardless
    /// of its id; downstream consumers tolerate unmatched frames.
    async fn poll_cycle(&mut self) -> crate::error::Result<()> {
        let request = Frame::status_request(self.ids.as_mut(), self.clock.now());
        self.transport.send(*request.as_wire()).await?;

        let mut last_seen = None;
        for _ in 0..RECEIVE_RETRY_COUNT {
            let raw = self.transport.receive().await?;
            let response = Frame::from_wire(&raw, self.clock.now());
            let matched = response.id() == request.id();
            if !matched {
                tracing::trace!(
                    "correlation mismatch: sent {:08x}, got {:08x}",
                    request.id(),
                    response.id()
                );
            }
            last_seen = Some(response);
            if matched {
                break;
            }
        }

        if let Some(frame) = last_seen {
            self.frames.push(frame);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, FRAME_LEN};
    use chrono::{DateTime, Utc};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    struct SeqIds(u32);

    impl IdSource for SeqIds {
        fn next_id(&mut self) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    struct TestClock;

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Scripted transport: fails `connect_failures` connection attempts,
    /// then echoes each sent request with `mismatches` wrong-id responses
    /// before the matching one, and reports the transport lost after
    /// `cycles_before_loss` poll cycles.
    struct ScriptedTransport {
        connect_failures: usize,
        connect_attempts: usize,
        connected: bool,
        mismatches: u32,
        response_payload: Vec<u8>,
        pending: VecDeque<[u8; FRAME_LEN]>,
        cycles_before_loss: usize,
        sends: usize,
    }

    impl ScriptedTransport {
        fn new(connect_failures: usize, mismatches: u32, cycles_before_loss: usize) -> Self {
            Self {
                connect_failures,
                connect_attempts: 0,
                connected: false,
                mismatches,
                response_payload: vec![
                    0x01, 0x9C, 0x11, 0xC5, 0x02, 0x20, 0x03, 0x00, 0x00, 0x95, 0x01, 0x13,
                ],
                pending: VecDeque::new(),
                cycles_before_loss,
                sends: 0,
            }
        }

        fn response_for(&self, id: u32) -> [u8; FRAME_LEN] {
            let mut raw = [0u8; FRAME_LEN];
            raw[0..4].copy_from_slice(&id.to_le_bytes());
            raw[4..6].copy_from_slice(&Command::GetChannelStatus.code().to_le_bytes());
            raw[6..8].copy_from_slice(&(self.response_payload.len() as u16).to_le_bytes());
            raw[8..8 + self.response_payload.len()].copy_from_slice(&self.response_payload);
            raw
        }
    }

    impl DeviceTransport for ScriptedTransport {
        fn connect(&mut self) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.connect_attempts += 1;
                if self.connect_attempts <= self.connect_failures {
                    return Err(Error::DeviceNotFound);
                }
                self.connected = true;
                Ok(())
            })
        }

        fn disconnect(
            &mut self,
        ) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.connected = false;
                Ok(())
            })
        }

        fn send(
            &mut self,
            frame: [u8; FRAME_LEN],
        ) -> Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send + '_>> {
            Box::pin(async move {
                if self.sends >= self.cycles_before_loss {
                    return Err(Error::TransportLost);
                }
                self.sends += 1;

                let id = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
                for i in 0..self.mismatches {
                    let mismatch = self.response_for(id.wrapping_add(i + 1));
                    self.pending.push_back(mismatch);
                }
                let matched = self.response_for(id);
                self.pending.push_back(matched);
                Ok(())
            })
        }

        fn receive(
            &mut self,
        ) -> Pin<Box<dyn Future<Output = crate::error::Result<[u8; FRAME_LEN]>> + Send + '_>>
        {
            Box::pin(async move { self.pending.pop_front().ok_or(Error::TransportLost) })
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn link_with(
        transport: ScriptedTransport,
        frames: Arc<EvictingQueue<Frame>>,
    ) -> DeviceLink<ScriptedTransport> {
        DeviceLink::new(
            transport,
            Box::new(SeqIds(0)),
            Arc::new(TestClock),
            ReconnectPolicy::fixed(Duration::from_millis(1)),
            Duration::from_millis(1),
            frames,
        )
    }

    #[tokio::test]
    async fn test_establish_converges_after_failures() {
        let frames = Arc::new(EvictingQueue::new(16));
        let mut link = link_with(ScriptedTransport::new(3, 0, 0), Arc::clone(&frames));
        assert_eq!(link.state(), ConnectionState::Disconnected);

        link.establish().await;
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.transport.connect_attempts, 4);
    }

    #[tokio::test]
    async fn test_poll_pushes_matched_frame() {
        let frames = Arc::new(EvictingQueue::new(16));
        let mut link = link_with(ScriptedTransport::new(0, 0, 1), Arc::clone(&frames));

        link.establish().await;
        link.poll_cycle().await.unwrap();

        let frame = frames.pop().expect("one frame queued");
        assert_eq!(frame.command(), Command::GetChannelStatus);
        assert_eq!(frame.id(), 1);
        assert_eq!(frame.fragment(1, 2), 4508);
    }

    #[tokio::test]
    async fn test_mismatches_are_retried() {
        let frames = Arc::new(EvictingQueue::new(16));
        let mut link = link_with(ScriptedTransport::new(0, 5, 1), Arc::clone(&frames));

        link.establish().await;
        link.poll_cycle().await.unwrap();

        // five mismatched responses skipped, the matching one queued
        assert_eq!(frames.len(), 1);
        assert_eq!(frames.pop().unwrap().id(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_pushes_last_seen() {
        let frames = Arc::new(EvictingQueue::new(16));
        // more mismatches than the retry budget: no response ever matches
        let mut link = link_with(
            ScriptedTransport::new(0, RECEIVE_RETRY_COUNT + 4, 1),
            Arc::clone(&frames),
        );

        link.establish().await;
        link.poll_cycle().await.unwrap();

        let frame = frames.pop().expect("last-seen frame queued");
        assert_ne!(frame.id(), 1);
    }

    #[tokio::test]
    async fn test_transport_loss_returns_to_disconnected() {
        let frames = Arc::new(EvictingQueue::new(16));
        let mut link = link_with(ScriptedTransport::new(0, 0, 2), Arc::clone(&frames));

        link.establish().await;
        link.poll_until_lost().await;

        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.transport.is_connected());
        // the two successful cycles each queued a frame
        assert_eq!(frames.len(), 2);
    }
}
