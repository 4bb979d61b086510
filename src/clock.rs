//! Time sources.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of timestamps for entries, snapshots and operations.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Every call to `now` advances the clock by `step` microseconds after
/// reading it, so consecutive operations get distinct, ordered timestamps.
/// A step of zero freezes time.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicI64,
    step: i64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self::with_step(start, 1)
    }

    pub fn with_step(start: Timestamp, step: i64) -> Self {
        Self {
            current: AtomicI64::new(start.0),
            step,
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Timestamp) {
        self.current.store(to.0, Ordering::SeqCst);
    }

    /// Move forward without producing a timestamp.
    pub fn advance(&self, micros: i64) {
        self.current.fetch_add(micros, Ordering::SeqCst);
    }

    /// Time the next call to `now` will return.
    pub fn peek(&self) -> Timestamp {
        Timestamp(self.current.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.current.fetch_add(self.step, Ordering::SeqCst))
    }
}
