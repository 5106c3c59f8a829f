//! Dispatcher metrics for observability
//!
//! Counters describing traffic through the dispatcher and the health of its
//! sinks. Sink failures never reach the submitting caller, so these counters
//! are where they become visible.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for dispatcher observability
///
/// # Example
///
/// ```
/// use rust_log_dispatch::DispatcherMetrics;
///
/// let metrics = DispatcherMetrics::new();
///
/// metrics.record_submitted();
/// metrics.record_delivered();
///
/// assert_eq!(metrics.submitted(), 1);
/// assert_eq!(metrics.delivered(), 1);
/// ```
#[derive(Debug)]
pub struct DispatcherMetrics {
    /// Records accepted by the ordering lane
    submitted: AtomicU64,

    /// Records discarded because the dispatcher was stopping or stopped
    rejected: AtomicU64,

    /// Successful `process` calls across all sinks
    delivered: AtomicU64,

    /// `process` or `flush` calls that returned an error
    sink_errors: AtomicU64,

    /// Sink callbacks that panicked
    sink_panics: AtomicU64,

    /// Submissions that waited for room in a bounded ordering queue
    block_events: AtomicU64,

    /// Completed flush barriers
    flushes: AtomicU64,
}

impl DispatcherMetrics {
    pub const fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            sink_panics: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_panics(&self) -> u64 {
        self.sink_panics.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_submitted(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_error(&self) -> u64 {
        self.sink_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_panic(&self) -> u64 {
        self.sink_panics.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_flush(&self) -> u64 {
        self.flushes.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of sink calls that failed, as a percentage (0.0 - 100.0)
    pub fn failure_rate(&self) -> f64 {
        let failed = (self.sink_errors() + self.sink_panics()) as f64;
        let total = self.delivered() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.submitted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.sink_errors.store(0, Ordering::Relaxed);
        self.sink_panics.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
    }
}

impl Default for DispatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DispatcherMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            submitted: AtomicU64::new(self.submitted()),
            rejected: AtomicU64::new(self.rejected()),
            delivered: AtomicU64::new(self.delivered()),
            sink_errors: AtomicU64::new(self.sink_errors()),
            sink_panics: AtomicU64::new(self.sink_panics()),
            block_events: AtomicU64::new(self.block_events()),
            flushes: AtomicU64::new(self.flushes()),
        }
    }
}
