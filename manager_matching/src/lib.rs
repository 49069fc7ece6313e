mod balance;
pub mod builder;
mod comprehension;
mod config;
pub mod manual;
mod participant;
mod payoff;
mod pool;
mod preallocate;
mod reactive;
mod session;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

pub use crate::balance::BalanceTracker;
pub use crate::comprehension::*;
pub use crate::config::*;
pub use crate::participant::*;
pub use crate::payoff::*;
pub use crate::pool::{ManagerPool, UsedManagers};
pub use crate::preallocate::{preallocate, PreAllocatedEngine};
pub use crate::reactive::ReactiveEngine;
pub use crate::session::Session;

/// Hands out managers to the participants of one session.
///
/// Implementations are shared by all the participants of a session and must
/// never give the same manager to two participants, whatever the interleaving
/// of the calls.
pub trait AssignmentEngine: Send + Sync {
    fn mode(&self) -> AssignmentMode;

    /// Returns the manager of this participant.
    ///
    /// The reactive engine picks the manager during this call. The pre-allocating
    /// engine returns the manager computed at creation time, or
    /// `MissingAssignment` if the pool ran out before this participant.
    fn assign(&self, participant: ParticipantId) -> Result<Assignment, MatchingErrors>;

    /// Records the pair type of a participant once their own preference is known.
    fn record_outcome(&self, same: bool) -> BalanceCounters;

    fn balance(&self) -> BalanceCounters;
}

/// How the reactive engine leans when picking the next manager.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum SelectionBias {
    Uniform,
    /// Too many same pairs: with the given probability, pick from the smaller
    /// of the Left/Right sub-pools.
    TowardMinority(f64),
    /// Too many different pairs: with the given probability, pick from the larger
    /// of the Left/Right sub-pools.
    TowardMajority(f64),
}

pub fn selection_bias(gap: i64, rules: &MatchingRules) -> SelectionBias {
    if gap > rules.balance_threshold {
        SelectionBias::TowardMinority(bias_probability(gap, rules))
    } else if gap < -rules.balance_threshold {
        SelectionBias::TowardMajority(bias_probability(gap, rules))
    } else {
        SelectionBias::Uniform
    }
}

fn bias_probability(gap: i64, rules: &MatchingRules) -> f64 {
    (rules.bias_base + gap.unsigned_abs() as f64 * rules.bias_step).min(rules.bias_cap)
}

/// The outcome of one reactive selection.
#[derive(PartialEq, Debug, Clone)]
pub struct Selection {
    pub manager: ManagerRecord,
    /// The used managers, including the selected one.
    pub used: UsedManagers,
    pub order: u32,
    pub bias: SelectionBias,
}

/// Picks the next manager given the managers already used and the current balance.
///
/// This function does not touch any shared state: the caller is responsible for
/// storing the returned set of used managers. Returns None when no manager is
/// available anymore.
pub fn select_manager<R: Rng>(
    pool: &ManagerPool,
    used: &UsedManagers,
    counters: &BalanceCounters,
    rules: &MatchingRules,
    rng: &mut R,
) -> Option<Selection> {
    let available = used.available(pool);
    if available.is_empty() {
        return None;
    }
    let left: Vec<&ManagerRecord> = available
        .iter()
        .filter(|r| r.preference == Preference::Left)
        .copied()
        .collect();
    let right: Vec<&ManagerRecord> = available
        .iter()
        .filter(|r| r.preference == Preference::Right)
        .copied()
        .collect();

    let gap = counters.gap();
    let bias = selection_bias(gap, rules);
    debug!(
        "select_manager: gap: {} available left: {} right: {} bias: {:?}",
        gap,
        left.len(),
        right.len(),
        bias
    );

    let chosen: Option<&ManagerRecord> = match bias {
        SelectionBias::Uniform => available.choose(rng).copied(),
        SelectionBias::TowardMinority(p) => {
            if rng.gen::<f64>() < p {
                // Ties go to the Right managers.
                if left.len() < right.len() {
                    pick_with_fallback(&left, &right, rng)
                } else {
                    pick_with_fallback(&right, &left, rng)
                }
            } else {
                available.choose(rng).copied()
            }
        }
        SelectionBias::TowardMajority(p) => {
            if rng.gen::<f64>() < p {
                // Ties go to the Right managers here too.
                if left.len() > right.len() {
                    pick_with_fallback(&left, &right, rng)
                } else {
                    pick_with_fallback(&right, &left, rng)
                }
            } else {
                available.choose(rng).copied()
            }
        }
    };

    let manager = chosen?.clone();
    let used = used.with(&manager.id);
    let order = used.len() as u32;
    Some(Selection {
        manager,
        used,
        order,
        bias,
    })
}

fn pick_with_fallback<'a, R: Rng>(
    preferred: &[&'a ManagerRecord],
    other: &[&'a ManagerRecord],
    rng: &mut R,
) -> Option<&'a ManagerRecord> {
    if preferred.is_empty() {
        other.choose(rng).copied()
    } else {
        preferred.choose(rng).copied()
    }
}

/// Builds the snapshot of a manager for one participant. The organization is
/// drawn here, independently of the manager.
pub fn make_assignment<R: Rng>(
    participant: ParticipantId,
    manager: &ManagerRecord,
    order: u32,
    timestamp: &str,
    rng: &mut R,
) -> Assignment {
    let organization = ORGANIZATIONS[rng.gen_range(0..ORGANIZATIONS.len())];
    Assignment {
        participant,
        manager_id: manager.id.clone(),
        manager_preference: manager.preference,
        team_label: manager.preference.painting().to_string(),
        organization: organization.to_string(),
        stated_amount: manager.stated_amount.clone(),
        correct_amount: manager.correct_amount.clone(),
        threshold_integer: manager.threshold_or_default(),
        order,
        timestamp: timestamp.to_string(),
    }
}

pub(crate) fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

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

    fn counters(same: u64, different: u64) -> BalanceCounters {
        BalanceCounters {
            same_count: same,
            different_count: different,
        }
    }

    #[test]
    fn bias_is_capped() {
        let rules = MatchingRules::DEFAULT_RULES;
        assert_eq!(
            selection_bias(counters(5, 1).gap(), &rules),
            SelectionBias::TowardMinority(0.8)
        );
        assert_eq!(selection_bias(2, &rules), SelectionBias::Uniform);
        assert_eq!(selection_bias(-2, &rules), SelectionBias::Uniform);
        assert_eq!(selection_bias(0, &rules), SelectionBias::Uniform);
        match selection_bias(-3, &rules) {
            SelectionBias::TowardMajority(p) => assert!((p - 0.8).abs() < 1e-9),
            b => panic!("unexpected bias {:?}", b),
        }
        assert_eq!(
            selection_bias(-10, &rules),
            SelectionBias::TowardMajority(0.8)
        );
    }

    #[test]
    fn exhausted_pool_selects_nothing() {
        let p = pool(1, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let rules = MatchingRules::DEFAULT_RULES;
        let used = UsedManagers::new().with("L0");
        assert!(select_manager(&p, &used, &counters(0, 0), &rules, &mut rng).is_none());
        assert!(select_manager(
            &ManagerPool::empty(),
            &UsedManagers::new(),
            &counters(0, 0),
            &rules,
            &mut rng
        )
        .is_none());
    }

    #[test]
    fn selection_marks_the_manager_used() {
        let p = pool(2, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let rules = MatchingRules::DEFAULT_RULES;
        let mut used = UsedManagers::new();
        let mut seen = Vec::new();
        for expected_order in 1..=4 {
            let sel = select_manager(&p, &used, &counters(0, 0), &rules, &mut rng).unwrap();
            assert_eq!(sel.order, expected_order);
            assert!(!seen.contains(&sel.manager.id));
            seen.push(sel.manager.id.clone());
            used = sel.used;
        }
        assert!(select_manager(&p, &used, &counters(0, 0), &rules, &mut rng).is_none());
    }

    #[test]
    fn minority_bias_favors_the_smaller_pool() {
        // 2 Left managers against 8 Right managers, gap 4: the Left managers should be
        // picked with probability 0.8 + 0.2 * 2/10 = 0.84.
        let p = pool(2, 8);
        let rules = MatchingRules::DEFAULT_RULES;
        let mut rng = StdRng::seed_from_u64(42);
        let mut left = 0;
        let trials = 4000;
        for _ in 0..trials {
            let sel =
                select_manager(&p, &UsedManagers::new(), &counters(5, 1), &rules, &mut rng).unwrap();
            if sel.manager.preference == Preference::Left {
                left += 1;
            }
        }
        let freq = left as f64 / trials as f64;
        assert!(freq > 0.78 && freq < 0.90, "frequency {}", freq);
    }

    #[test]
    fn majority_bias_favors_the_larger_pool() {
        let p = pool(2, 8);
        let rules = MatchingRules::DEFAULT_RULES;
        let mut rng = StdRng::seed_from_u64(3);
        let mut right = 0;
        let trials = 4000;
        for _ in 0..trials {
            let sel =
                select_manager(&p, &UsedManagers::new(), &counters(0, 6), &rules, &mut rng).unwrap();
            if sel.manager.preference == Preference::Right {
                right += 1;
            }
        }
        // 0.8 + 0.2 * 8/10 = 0.96
        let freq = right as f64 / trials as f64;
        assert!(freq > 0.92, "frequency {}", freq);
    }

    fn right_frequency(counters: BalanceCounters, seed: u64) -> f64 {
        let p = pool(3, 3);
        let rules = MatchingRules::DEFAULT_RULES;
        let mut rng = StdRng::seed_from_u64(seed);
        let trials = 4000;
        let mut right = 0;
        for _ in 0..trials {
            let sel =
                select_manager(&p, &UsedManagers::new(), &counters, &rules, &mut rng).unwrap();
            if sel.manager.preference == Preference::Right {
                right += 1;
            }
        }
        right as f64 / trials as f64
    }

    #[test]
    fn minority_bias_breaks_ties_toward_right() {
        // Equal sub-pools: 0.8 + 0.2 * 3/6 = 0.9
        let freq = right_frequency(counters(5, 1), 21);
        assert!(freq > 0.86 && freq < 0.94, "frequency {}", freq);
    }

    #[test]
    fn majority_bias_breaks_ties_toward_right() {
        let freq = right_frequency(counters(1, 5), 22);
        assert!(freq > 0.86 && freq < 0.94, "frequency {}", freq);
    }

    #[test]
    fn bias_falls_back_when_preferred_pool_is_empty() {
        // Only Right managers are left: the minority pool (Left) is empty.
        let p = pool(0, 3);
        let rules = MatchingRules::DEFAULT_RULES;
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let sel =
                select_manager(&p, &UsedManagers::new(), &counters(9, 0), &rules, &mut rng).unwrap();
            assert_eq!(sel.manager.preference, Preference::Right);
        }
    }

    #[test]
    fn assignment_derives_team_and_threshold() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut m = ManagerRecord::new("m9", Preference::Right);
        m.stated_amount = Some("12".to_string());
        let a = make_assignment(ParticipantId(3), &m, 1, "2024-01-01 10:00:00", &mut rng);
        assert_eq!(a.team_label, "Kandinsky");
        assert_eq!(a.threshold_integer, DEFAULT_THRESHOLD_INTEGER);
        assert_eq!(a.stated_amount.as_deref(), Some("12"));
        assert!(ORGANIZATIONS.contains(&a.organization.as_str()));
    }
}
