use log::{info, warn};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::balance::BalanceTracker;
use crate::config::*;
use crate::pool::ManagerPool;
use crate::{make_assignment, timestamp_now, AssignmentEngine};

/// Computes the manager of every participant in one pass.
///
/// The Left and Right managers are shuffled separately. Participants then take
/// turns: participant 1 (and every odd participant) draws from the Left managers,
/// participant 2 (and every even participant) from the Right managers. When the
/// preferred side runs out the other side is used. Participants beyond the size
/// of the pool get None.
pub fn preallocate<R: Rng>(
    pool: &ManagerPool,
    num_participants: usize,
    timestamp: &str,
    rng: &mut R,
) -> Vec<Option<Assignment>> {
    let mut left: Vec<&ManagerRecord> = pool.with_preference(Preference::Left);
    let mut right: Vec<&ManagerRecord> = pool.with_preference(Preference::Right);
    left.shuffle(rng);
    right.shuffle(rng);
    let mut left = left.into_iter();
    let mut right = right.into_iter();

    let mut order: u32 = 0;
    let mut res: Vec<Option<Assignment>> = Vec::with_capacity(num_participants);
    for idx in 0..num_participants {
        let participant = ParticipantId(idx as u32 + 1);
        let (preferred, other) = if idx % 2 == 0 {
            (&mut left, &mut right)
        } else {
            (&mut right, &mut left)
        };
        match preferred.next().or_else(|| other.next()) {
            Some(manager) => {
                order += 1;
                res.push(Some(make_assignment(
                    participant,
                    manager,
                    order,
                    timestamp,
                    rng,
                )));
            }
            None => {
                warn!("preallocate: no manager left for participant {}", participant);
                res.push(None);
            }
        }
    }
    res
}

/// Serves the assignments computed once at session creation.
///
/// Nothing is shared between participants at request time, apart from the
/// balance counters kept for reporting.
pub struct PreAllocatedEngine {
    assignments: Vec<Option<Assignment>>,
    balance: BalanceTracker,
}

impl PreAllocatedEngine {
    pub fn new(pool: &ManagerPool, num_participants: usize, seed: Option<u64>) -> PreAllocatedEngine {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let assignments = preallocate(pool, num_participants, &timestamp_now(), &mut rng);
        let matched = assignments.iter().filter(|a| a.is_some()).count();
        info!(
            "Pre-allocation done: {} of {} participants matched",
            matched, num_participants
        );
        for a in assignments.iter().flatten() {
            info!(
                "Participant {} -> manager {} ({}, order {})",
                a.participant, a.manager_id, a.manager_preference, a.order
            );
        }
        PreAllocatedEngine {
            assignments,
            balance: BalanceTracker::new(),
        }
    }

    pub fn assignments(&self) -> &[Option<Assignment>] {
        &self.assignments
    }
}

impl AssignmentEngine for PreAllocatedEngine {
    fn mode(&self) -> AssignmentMode {
        AssignmentMode::PreAllocate
    }

    fn assign(&self, participant: ParticipantId) -> Result<Assignment, MatchingErrors> {
        let idx = (participant.0 as usize)
            .checked_sub(1)
            .ok_or(MatchingErrors::UnknownParticipant { participant })?;
        match self.assignments.get(idx) {
            Some(Some(a)) => Ok(a.clone()),
            Some(None) => Err(MatchingErrors::MissingAssignment { participant }),
            None => Err(MatchingErrors::UnknownParticipant { participant }),
        }
    }

    fn record_outcome(&self, same: bool) -> BalanceCounters {
        self.balance.record_outcome(same)
    }

    fn balance(&self) -> BalanceCounters {
        self.balance.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(left: usize, right: usize) -> ManagerPool {
        let mut records = Vec::new();
        for i in 0..left {
            records.push(ManagerRecord::new(&format!("L{}", i), Preference::Left));
        }
        for i in 0..right {
            records.push(ManagerRecord::new(&format!("R{}", i), Preference::Right));
        }
        ManagerPool::new(records).unwrap()
    }

    fn ids(assignments: &[Option<Assignment>]) -> Vec<Option<String>> {
        assignments
            .iter()
            .map(|a| a.as_ref().map(|a| a.manager_id.clone()))
            .collect()
    }

    #[test]
    fn alternates_between_preferences() {
        let mut rng = StdRng::seed_from_u64(9);
        let res = preallocate(&pool(3, 3), 6, "t", &mut rng);
        let prefs: Vec<Preference> = res
            .iter()
            .map(|a| a.as_ref().unwrap().manager_preference)
            .collect();
        assert_eq!(
            prefs,
            vec![
                Preference::Left,
                Preference::Right,
                Preference::Left,
                Preference::Right,
                Preference::Left,
                Preference::Right
            ]
        );
        let orders: Vec<u32> = res.iter().map(|a| a.as_ref().unwrap().order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn falls_back_to_the_other_side() {
        let mut rng = StdRng::seed_from_u64(9);
        let res = preallocate(&pool(1, 4), 5, "t", &mut rng);
        let prefs: Vec<Preference> = res
            .iter()
            .map(|a| a.as_ref().unwrap().manager_preference)
            .collect();
        assert_eq!(prefs[0], Preference::Left);
        assert!(prefs[1..].iter().all(|p| *p == Preference::Right));
    }

    #[test]
    fn is_reproducible_with_a_seed() {
        let p = pool(5, 7);
        let a = preallocate(&p, 10, "t", &mut StdRng::seed_from_u64(1234));
        let b = preallocate(&p, 10, "t", &mut StdRng::seed_from_u64(1234));
        assert_eq!(a, b);
    }

    #[test]
    fn extra_participants_get_nothing() {
        let engine = PreAllocatedEngine::new(&pool(2, 1), 5, Some(3));
        let matched: Vec<Assignment> = engine.assignments().iter().flatten().cloned().collect();
        assert_eq!(matched.len(), 3);
        let distinct: HashSet<&str> = matched.iter().map(|a| a.manager_id.as_str()).collect();
        assert_eq!(distinct.len(), 3);
        assert_eq!(ids(engine.assignments())[3], None);
        assert_eq!(
            engine.assign(ParticipantId(4)),
            Err(MatchingErrors::MissingAssignment {
                participant: ParticipantId(4)
            })
        );
        assert_eq!(
            engine.assign(ParticipantId(6)),
            Err(MatchingErrors::UnknownParticipant {
                participant: ParticipantId(6)
            })
        );
        assert_eq!(
            engine.assign(ParticipantId(0)),
            Err(MatchingErrors::UnknownParticipant {
                participant: ParticipantId(0)
            })
        );
    }
}
