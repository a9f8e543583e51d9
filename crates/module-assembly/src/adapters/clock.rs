//! # Simulated Clock
//!
//! Monotonic in-memory time shared by timelocked adapters and the simulator.

use crate::ports::outbound::Clock;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

/// Default genesis time for fixtures.
pub const DEFAULT_GENESIS_TIME: u64 = 1_700_000_000;

/// Simulated time that only moves forward.
#[derive(Debug)]
pub struct SimulatedClock {
    now: Mutex<u64>,
}

impl SimulatedClock {
    /// Clock starting at `start`.
    #[must_use]
    pub fn starting_at(start: u64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Current time.
    #[must_use]
    pub fn current(&self) -> u64 {
        *self.now.lock()
    }

    /// Advance by `secs`, saturating at `u64::MAX`.
    pub fn advance_by(&self, secs: u64) -> u64 {
        let mut now = self.now.lock();
        *now = now.saturating_add(secs);
        *now
    }

    /// Move forward to `timestamp`; earlier targets are ignored.
    pub fn advance_to_sync(&self, timestamp: u64) -> u64 {
        let mut now = self.now.lock();
        if timestamp > *now {
            debug!(from = *now, to = timestamp, "advancing simulated clock");
            *now = timestamp;
        }
        *now
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::starting_at(DEFAULT_GENESIS_TIME)
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    async fn now(&self) -> u64 {
        self.current()
    }

    async fn advance_to(&self, timestamp: u64) -> u64 {
        self.advance_to_sync(timestamp)
    }
}
