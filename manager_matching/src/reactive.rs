use log::{info, warn};

use rand::rngs::StdRng;
use parking_lot::Mutex;
use rand::SeedableRng;

use crate::balance::BalanceTracker;
use crate::config::*;
use crate::pool::{ManagerPool, UsedManagers};
use crate::{make_assignment, select_manager, timestamp_now, AssignmentEngine};

struct ReactiveState {
    used: UsedManagers,
    rng: StdRng,
}

/// Matches each participant when they reach the Role page.
///
/// The choice leans toward the pair type the session is missing, based on the
/// counters at the time of the call. The whole selection (reading the available
/// managers, picking one, marking it used) happens under one lock.
///
/// The counters themselves are updated later, under their own lock, when the
/// participant picks a painting. A participant matched in between sees a gap that
/// does not include the pairs still in progress.
pub struct ReactiveEngine {
    pool: ManagerPool,
    rules: MatchingRules,
    state: Mutex<ReactiveState>,
    balance: BalanceTracker,
}

impl ReactiveEngine {
    pub fn new(pool: ManagerPool, rules: &MatchingRules, seed: Option<u64>) -> ReactiveEngine {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        ReactiveEngine {
            pool,
            rules: rules.clone(),
            state: Mutex::new(ReactiveState {
                used: UsedManagers::new(),
                rng,
            }),
            balance: BalanceTracker::new(),
        }
    }

    pub fn pool(&self) -> &ManagerPool {
        &self.pool
    }

    /// The managers handed out so far, in order.
    pub fn used_ids(&self) -> Vec<String> {
        self.state.lock().used.ids().to_vec()
    }
}

impl AssignmentEngine for ReactiveEngine {
    fn mode(&self) -> AssignmentMode {
        AssignmentMode::Reactive
    }

    fn assign(&self, participant: ParticipantId) -> Result<Assignment, MatchingErrors> {
        let mut guard = self.state.lock();
        let state: &mut ReactiveState = &mut guard;
        let counters = self.balance.snapshot();
        let selection = match select_manager(
            &self.pool,
            &state.used,
            &counters,
            &self.rules,
            &mut state.rng,
        ) {
            Some(s) => s,
            None => {
                warn!(
                    "No available manager for participant {} ({} managers used)",
                    participant,
                    state.used.len()
                );
                return Err(MatchingErrors::PoolExhausted { participant });
            }
        };
        state.used = selection.used;
        let assignment = make_assignment(
            participant,
            &selection.manager,
            selection.order,
            &timestamp_now(),
            &mut state.rng,
        );
        info!(
            "Matched participant {} with manager {} ({}, order {}, gap {}, bias {:?})",
            participant,
            assignment.manager_id,
            assignment.manager_preference,
            assignment.order,
            counters.gap(),
            selection.bias
        );
        Ok(assignment)
    }

    fn record_outcome(&self, same: bool) -> BalanceCounters {
        self.balance.record_outcome(same)
    }

    fn balance(&self) -> BalanceCounters {
        self.balance.snapshot()
    }
}
