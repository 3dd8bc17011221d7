//! Protocol definitions for PCV communication.
//!
//! This module contains the low-level protocol types:
//! - 64-byte frame encoding/decoding
//! - Command opcodes
//! - Correlation id generation

pub mod command;
pub mod frame;

pub use command::Command;
pub use frame::{
    Direction, FRAME_LEN, Frame, HEADER_LEN, MAX_PAYLOAD_LEN, STATUS_REQUEST_PAYLOAD,
};

use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Source of correlation ids for outbound request frames.
///
/// The device echoes a request's id in its response, so the id is the only
/// way to match a response to the request that caused it. Injected at
/// construction so tests can use deterministic ids.
pub trait IdSource: Send {
    /// Returns a fresh correlation id.
    fn next_id(&mut self) -> u32;
}

/// Default [`IdSource`] backed by a seeded CSPRNG.
#[derive(Debug)]
pub struct RandomIdSource {
    rng: StdRng,
}

impl RandomIdSource {
    /// Creates an id source seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for RandomIdSource {
    fn next_id(&mut self) -> u32 {
        self.rng.next_u32()
    }
}
