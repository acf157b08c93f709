//! Timestamp source for audit stamping.
//!
//! # Invariants
//! - Every stamp is Unix epoch milliseconds.
//! - A re-stamp is strictly greater than the stamp it replaces, even when
//!   the clock stands still or steps backwards.

use crate::model::EpochMs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" for the store.
pub trait Clock {
    fn now_ms(&self) -> EpochMs;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMs {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Clock frozen at one instant. Used for deterministic imports and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub EpochMs);

impl Clock for FixedClock {
    fn now_ms(&self) -> EpochMs {
        self.0
    }
}

/// Returns the stamp for a write that replaces `previous`.
pub fn restamp(now: EpochMs, previous: EpochMs) -> EpochMs {
    now.max(previous.saturating_add(1))
}
