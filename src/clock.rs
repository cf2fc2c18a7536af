//! Monotonic wall-clock source for record timestamps

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch-millisecond clock clamped to be non-decreasing.
///
/// Wall-clock steps (NTP corrections, suspend/resume) must not produce
/// out-of-order samples within a category, so every reading is clamped
/// against the highest value handed out so far.
pub struct Clock {
    last_millis: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            last_millis: AtomicU64::new(0),
        }
    }

    /// Current time as milliseconds since the Unix epoch, never decreasing.
    pub fn now_millis(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let prev = self.last_millis.fetch_max(wall, Ordering::AcqRel);
        prev.max(wall)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_decreasing() {
        let clock = Clock::new();
        let mut last = 0;
        for _ in 0..1000 {
            let now = clock.now_millis();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_clamps_against_backwards_wall_clock() {
        let clock = Clock::new();
        // Pre-load a timestamp far in the future; subsequent readings must
        // not drop below it even though the wall clock is behind.
        clock.last_millis.store(u64::MAX - 1, Ordering::SeqCst);
        assert_eq!(clock.now_millis(), u64::MAX - 1);
    }
}
