//! Free-running counters sampled once per second into a [`Counters`] snapshot.
//!
//! Spec §7 requires that every non-fatal error category and every byte/packet
//! total be visible as a "stats snapshot sampled once per second" rather than
//! surfaced through the hot path. Each counter is a plain atomic increment;
//! nothing here allocates or blocks.

use core::sync::atomic::{AtomicU64, Ordering};

/// A single named counter. Increment from any context, including one that
/// must not block (a capture callback running at interrupt-like priority).
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time copy of [`Counter`] values, suitable for logging or
/// publishing to a UI once per second.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub value: u64,
}

impl Counter {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot { value: self.get() }
    }
}
