//! Millisecond timestamps used for throttle bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of "now" shared by a router and the rules it evaluates.
///
/// `Monotonic` counts milliseconds since the clock was created, so
/// timestamps never go backwards. `Manual` only moves when told to and
/// exists so admission timing can be pinned down exactly.
#[derive(Debug, Clone)]
pub enum Clock {
    Monotonic(Instant),
    Manual(Arc<AtomicU64>),
}

impl Clock {
    pub fn monotonic() -> Self {
        Clock::Monotonic(Instant::now())
    }

    pub fn manual(start_millis: u64) -> Self {
        Clock::Manual(Arc::new(AtomicU64::new(start_millis)))
    }

    pub fn now_millis(&self) -> u64 {
        match self {
            Clock::Monotonic(origin) => origin.elapsed().as_millis() as u64,
            Clock::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    /// Moves a manual clock forward. No effect on a monotonic clock.
    pub fn advance(&self, millis: u64) {
        if let Clock::Manual(now) = self {
            now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    /// Sets a manual clock to an absolute value. No effect on a monotonic clock.
    pub fn set(&self, millis: u64) {
        if let Clock::Manual(now) = self {
            now.store(millis, Ordering::SeqCst);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::monotonic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = Clock::manual(10);
        let other = clock.clone();
        clock.advance(90);
        assert_eq!(other.now_millis(), 100);
        other.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_monotonic_clock_ignores_manual_controls() {
        let clock = Clock::monotonic();
        clock.set(1_000_000);
        clock.advance(1_000_000);
        assert!(clock.now_millis() < 1_000_000);
    }
}
