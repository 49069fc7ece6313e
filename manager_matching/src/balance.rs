use log::info;

use parking_lot::Mutex;

use crate::config::*;

/// Session-wide count of same-preference and different-preference pairs.
///
/// Counters only go up. Every update takes the lock, so concurrent participants
/// never lose an update.
#[derive(Debug, Default)]
pub struct BalanceTracker {
    counters: Mutex<BalanceCounters>,
}

impl BalanceTracker {
    pub fn new() -> BalanceTracker {
        BalanceTracker::default()
    }

    /// Records the outcome of one pair and returns the counters after the update.
    pub fn record_outcome(&self, same: bool) -> BalanceCounters {
        let mut counters = self.counters.lock();
        if same {
            counters.same_count += 1;
        } else {
            counters.different_count += 1;
        }
        info!(
            "Pair recorded: {} (same: {}, different: {}, gap: {})",
            if same { "SAME" } else { "DIFFERENT" },
            counters.same_count,
            counters.different_count,
            counters.gap()
        );
        *counters
    }

    pub fn snapshot(&self) -> BalanceCounters {
        *self.counters.lock()
    }

    pub fn gap(&self) -> i64 {
        self.snapshot().gap()
    }
}
