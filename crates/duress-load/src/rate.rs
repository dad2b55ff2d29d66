//! Request accounting for load generators
//!
//! Generators bump [`LoadCounters`] from many request tasks at once; a single
//! sampler drains completions into a [`RateMeasurer`] once per second.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by a generator and its request tasks
#[derive(Debug, Default)]
pub struct LoadCounters {
    issued: AtomicU64,
    completed: AtomicU64,
    errors: AtomicU64,
    outstanding: AtomicU64,
}

impl LoadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request was sent
    pub fn record_issued(&self) {
        self.issued.fetch_add(1, Ordering::Relaxed);
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// A request finished successfully
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    /// A request finished with an error; it does not count as completed
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Requests sent but not yet finished
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// Sliding window of per-second completion counts
///
/// ```rust
/// use duress_load::RateMeasurer;
///
/// let mut rate = RateMeasurer::new(2);
/// rate.record(10);
/// rate.tick();
/// assert!(!rate.is_full());
///
/// rate.record(6);
/// rate.tick();
/// assert!(rate.is_full());
/// assert_eq!(rate.rate(), 8.0);
/// ```
#[derive(Debug, Clone)]
pub struct RateMeasurer {
    window: usize,
    buckets: VecDeque<u64>,
    current: u64,
    total_seen: u64,
}

impl RateMeasurer {
    /// Measurer averaging over `window` seconds (at least one)
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buckets: VecDeque::with_capacity(window),
            current: 0,
            total_seen: 0,
        }
    }

    /// Add completions to the second in progress
    pub fn record(&mut self, completions: u64) {
        self.current += completions;
    }

    /// Feed the measurer from a cumulative completion counter
    ///
    /// Records the difference to the previous total seen.
    pub fn record_total(&mut self, total: u64) {
        let delta = total.saturating_sub(self.total_seen);
        self.total_seen = self.total_seen.max(total);
        self.record(delta);
    }

    /// Close the second in progress and slide the window
    pub fn tick(&mut self) {
        self.buckets.push_back(self.current);
        self.current = 0;
        while self.buckets.len() > self.window {
            self.buckets.pop_front();
        }
    }

    /// Whether a full window of seconds has been observed
    pub fn is_full(&self) -> bool {
        self.buckets.len() >= self.window
    }

    /// Average completions per second over the closed seconds in the window
    pub fn rate(&self) -> f64 {
        if self.buckets.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.buckets.iter().sum();
        sum as f64 / self.buckets.len() as f64
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
