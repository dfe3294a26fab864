use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) dialed: AtomicU64,
    pub(crate) reused: AtomicU64,
    pub(crate) released: AtomicU64,
    pub(crate) probes_passed: AtomicU64,
    pub(crate) probes_failed: AtomicU64,
    pub(crate) discarded_full: AtomicU64,
    pub(crate) discarded_by_caller: AtomicU64,
    pub(crate) close_errors: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Statistics about the connection pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently idle in the pool
    pub idle: usize,
    /// Maximum number of idle connections
    pub capacity: usize,
    pub closed: bool,
    /// Transports opened by the dialer, including the initial fill
    pub dialed: u64,
    /// Acquisitions served from the idle queue
    pub reused: u64,
    pub released: u64,
    pub probes_passed: u64,
    pub probes_failed: u64,
    /// Healthy connections closed because the idle queue was full
    pub discarded_full: u64,
    pub discarded_by_caller: u64,
    /// Transport shutdowns that returned an error
    pub close_errors: u64,
}

impl PoolStats {
    pub(crate) fn snapshot(counters: &PoolCounters, idle: usize, capacity: usize, closed: bool) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Self {
            idle,
            capacity,
            closed,
            dialed: load(&counters.dialed),
            reused: load(&counters.reused),
            released: load(&counters.released),
            probes_passed: load(&counters.probes_passed),
            probes_failed: load(&counters.probes_failed),
            discarded_full: load(&counters.discarded_full),
            discarded_by_caller: load(&counters.discarded_by_caller),
            close_errors: load(&counters.close_errors),
        }
    }
}
