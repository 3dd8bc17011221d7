//! Injectable time source.
//!
//! Frames and readings are stamped with a capture time. The clock is a
//! constructor parameter rather than an ambient global so tests can pin
//! timestamps.

use chrono::{DateTime, Utc};

/// Source of capture timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// System UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
