//! Time sources used by measurements
//!
//! A [`Clock`] only has to be monotonically non-decreasing. Measurements
//! subtract two readings, so the origin is irrelevant.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source in fractional seconds
pub trait Clock: Send + Sync {
    /// Current reading in seconds
    fn seconds(&self) -> f64;
}

/// Wall-clock time since construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// User plus system CPU time consumed by this process
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct ProcessCpuClock {
    // f64 bits of the last successful reading
    last: AtomicU64,
}

#[cfg(unix)]
impl ProcessCpuClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn read() -> Option<f64> {
        use libc::{RUSAGE_SELF, getrusage, rusage};

        let mut usage: rusage = unsafe { std::mem::zeroed() };
        let result = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
        if result != 0 {
            return None;
        }

        let user = usage.ru_utime.tv_sec as f64 + usage.ru_utime.tv_usec as f64 / 1e6;
        let system = usage.ru_stime.tv_sec as f64 + usage.ru_stime.tv_usec as f64 / 1e6;
        Some(user + system)
    }
}

#[cfg(unix)]
impl Clock for ProcessCpuClock {
    fn seconds(&self) -> f64 {
        let last = f64::from_bits(self.last.load(Ordering::Acquire));
        match Self::read() {
            Some(now) if now >= last => {
                self.last.store(now.to_bits(), Ordering::Release);
                now
            }
            // getrusage failed: repeat the last reading to stay monotonic
            _ => last,
        }
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same reading, so an operation holding one clone can
/// advance the time seen by a measurement holding another.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    bits: Arc<AtomicU64>,
}

impl FakeClock {
    /// Clock reading `0.0`
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `seconds`
    pub fn starting_at(seconds: f64) -> Self {
        let clock = Self::new();
        clock.set(seconds);
        clock
    }

    /// Move the clock forward by `delta` seconds. Negative deltas are ignored.
    pub fn advance(&self, delta: f64) {
        if delta <= 0.0 {
            return;
        }
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }

    /// Jump to an absolute reading. Readings never move backwards.
    pub fn set(&self, seconds: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (seconds > f64::from_bits(bits)).then_some(seconds.to_bits())
            });
    }
}

impl Clock for FakeClock {
    fn seconds(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
