//! Memory-pressure governor.
//!
//! Samples available memory at a fixed interval (not every tick) and
//! classifies it against the warning and critical thresholds. The link
//! reacts to the classification: counting, logging, and under critical
//! pressure clearing the pending slot while idle.

use embassy_time::{Duration, Instant};

/// How often available memory is sampled
pub const MEMORY_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Minimum free memory required to bring the radio up at all
pub const MIN_FREE_FOR_INIT: u32 = 10_240;

/// Below this, memory pressure is reported as a warning
pub const LOW_MEMORY_THRESHOLD: u32 = 5_120;

/// Below this, memory pressure is critical and cleanup runs
pub const CRITICAL_MEMORY_THRESHOLD: u32 = 2_048;

/// Result of one memory sample
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemoryStatus {
    Ok,
    Warning,
    Critical,
}

pub(crate) struct MemoryMonitor {
    last_check_at: Option<Instant>,
}

impl MemoryMonitor {
    pub(crate) const fn new() -> Self {
        MemoryMonitor { last_check_at: None }
    }

    /// Starts the sampling clock, typically at initialization time
    pub(crate) fn start(&mut self, now: Instant) {
        self.last_check_at = Some(now);
    }

    /// Classifies `free_bytes` when a check is due, `None` otherwise
    pub(crate) fn poll(&mut self, now: Instant, free_bytes: u32) -> Option<MemoryStatus> {
        let due = match self.last_check_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= MEMORY_CHECK_INTERVAL,
        };
        if !due {
            return None;
        }
        self.last_check_at = Some(now);
        Some(classify(free_bytes))
    }
}

/// Maps a free-memory sample onto a [`MemoryStatus`]
pub fn classify(free_bytes: u32) -> MemoryStatus {
    if free_bytes < CRITICAL_MEMORY_THRESHOLD {
        MemoryStatus::Critical
    } else if free_bytes < LOW_MEMORY_THRESHOLD {
        MemoryStatus::Warning
    } else {
        MemoryStatus::Ok
    }
}

/// Whether initialization may proceed with `free_bytes` available
pub fn sufficient_for_init(free_bytes: u32) -> bool {
    free_bytes >= MIN_FREE_FOR_INIT
}
