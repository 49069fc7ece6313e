use log::{debug, error, info, warn};

use rand::rngs::StdRng;
use parking_lot::{Mutex, MutexGuard};
use rand::SeedableRng;

use crate::comprehension::{ComprehensionAnswers, ComprehensionOutcome};
use crate::config::*;
use crate::participant::{ParticipantState, UnmatchedReason};
use crate::payoff::PayoffRecord;
use crate::pool::ManagerPool;
use crate::preallocate::PreAllocatedEngine;
use crate::reactive::ReactiveEngine;
use crate::{timestamp_now, AssignmentEngine};

/// One run of the experiment.
///
/// A session owns the assignment engine and the state of every participant.
/// Each step method corresponds to one page submission and can be called
/// concurrently for different participants. A participant's own state is locked
/// for the duration of the step; the engine is only locked inside that scope,
/// never the other way around.
pub struct Session {
    rules: MatchingRules,
    engine: Box<dyn AssignmentEngine>,
    participants: Vec<Mutex<ParticipantState>>,
    rng: Mutex<StdRng>,
    start_time: String,
    num_managers: usize,
    data_source_error: Option<String>,
}

impl Session {
    pub fn new(
        pool: ManagerPool,
        num_participants: usize,
        rules: &MatchingRules,
        seed: Option<u64>,
    ) -> Session {
        Session::create(pool, num_participants, rules, seed, None)
    }

    /// A session for which the manager dataset could not be loaded. It runs with an
    /// empty pool: every participant ends up unmatched and every page shows the
    /// default values.
    pub fn without_managers(
        num_participants: usize,
        rules: &MatchingRules,
        seed: Option<u64>,
        reason: &str,
    ) -> Session {
        error!("Manager data unavailable: {}", reason);
        Session::create(
            ManagerPool::empty(),
            num_participants,
            rules,
            seed,
            Some(reason.to_string()),
        )
    }

    fn create(
        pool: ManagerPool,
        num_participants: usize,
        rules: &MatchingRules,
        seed: Option<u64>,
        data_source_error: Option<String>,
    ) -> Session {
        let start_time = timestamp_now();
        let num_managers = pool.len();
        info!("Session start time: {}", start_time);
        info!("Total participants in session: {}", num_participants);
        info!("Total managers available: {}", num_managers);
        if num_managers < num_participants {
            warn!(
                "Not enough managers! Need {}, have {} (shortage: {})",
                num_participants,
                num_managers,
                num_participants - num_managers
            );
        } else {
            info!(
                "Sufficient managers available (surplus: {})",
                num_managers - num_participants
            );
        }
        info!("Assignment mode: {:?}", rules.assignment_mode);

        let engine_seed = seed.map(|s| s.wrapping_add(1));
        let engine: Box<dyn AssignmentEngine> = match rules.assignment_mode {
            AssignmentMode::Reactive => Box::new(ReactiveEngine::new(pool, rules, engine_seed)),
            AssignmentMode::PreAllocate => Box::new(PreAllocatedEngine::new(
                &pool,
                num_participants,
                engine_seed,
            )),
        };
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let session = Session {
            rules: rules.clone(),
            engine,
            participants: (1..=num_participants)
                .map(|i| Mutex::new(ParticipantState::new(ParticipantId(i as u32))))
                .collect(),
            rng: Mutex::new(rng),
            start_time,
            num_managers,
            data_source_error,
        };

        // Pre-allocated assignments are attached right away; the Role page only
        // reads them back.
        if session.engine.mode() == AssignmentMode::PreAllocate {
            for pid in session.participant_ids() {
                if let Err(e) = session.role(pid) {
                    debug!("create: participant {} left unmatched: {}", pid, e);
                }
            }
        }
        session
    }

    pub fn mode(&self) -> AssignmentMode {
        self.engine.mode()
    }

    pub fn rules(&self) -> &MatchingRules {
        &self.rules
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn num_participants(&self) -> usize {
        self.participants.len()
    }

    pub fn num_managers(&self) -> usize {
        self.num_managers
    }

    pub fn data_source_error(&self) -> Option<&str> {
        self.data_source_error.as_deref()
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = ParticipantId> {
        (1..=self.participants.len()).map(|i| ParticipantId(i as u32))
    }

    pub fn balance(&self) -> BalanceCounters {
        self.engine.balance()
    }

    /// A copy of the current state of this participant.
    pub fn participant(&self, pid: ParticipantId) -> Result<ParticipantState, MatchingErrors> {
        Ok(self.lock_participant(pid)?.clone())
    }

    fn lock_participant(
        &self,
        pid: ParticipantId,
    ) -> Result<MutexGuard<'_, ParticipantState>, MatchingErrors> {
        let idx = (pid.0 as usize)
            .checked_sub(1)
            .ok_or(MatchingErrors::UnknownParticipant { participant: pid })?;
        Ok(self
            .participants
            .get(idx)
            .ok_or(MatchingErrors::UnknownParticipant { participant: pid })?
            .lock())
    }

    fn unmatched_reason(&self) -> UnmatchedReason {
        if self.data_source_error.is_some() {
            UnmatchedReason::NoManagerData
        } else {
            UnmatchedReason::PoolExhausted
        }
    }

    /// Role page: returns the manager of the participant, matching them first if
    /// needed. Calling it again returns the same manager.
    pub fn role(&self, pid: ParticipantId) -> Result<Assignment, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        self.match_participant(&mut state)
    }

    // The caller holds the participant lock.
    fn match_participant(
        &self,
        state: &mut ParticipantState,
    ) -> Result<Assignment, MatchingErrors> {
        if let Some(a) = state.maybe_assignment() {
            return Ok(a.clone());
        }
        if let Some(e) = state.unmatched_error() {
            return Err(e);
        }
        match self.engine.assign(state.id()) {
            Ok(a) => {
                state.assignment = Some(a.clone());
                Ok(a)
            }
            Err(e) => {
                state.mark_unmatched(self.unmatched_reason(), e.clone());
                Err(e)
            }
        }
    }

    /// Painting page: stores the painting of the participant and records the pair
    /// type. Returns None for a participant without a manager.
    ///
    /// The pair type is recorded once. A second submission keeps the first choice.
    pub fn painting(
        &self,
        pid: ParticipantId,
        preference: Preference,
    ) -> Result<Option<PairType>, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        state.check_page(Page::Painting)?;
        if let Some(pt) = state.pair_type() {
            debug!(
                "painting: participant {} already recorded as {:?}",
                pid, pt
            );
            return Ok(Some(pt));
        }
        state.prefer = Some(preference);
        let manager_preference = match state.maybe_assignment() {
            Some(a) => a.manager_preference,
            None => {
                warn!(
                    "Participant {} chose {} but has no manager; no pair recorded",
                    pid, preference
                );
                return Ok(None);
            }
        };
        let pair_type = PairType::of(preference, manager_preference);
        let counters = self.engine.record_outcome(pair_type.is_same());
        state.pair_type = Some(pair_type);
        info!(
            "Participant {} chose {} with a {} manager: {:?} (same: {}, different: {})",
            pid,
            preference,
            manager_preference,
            pair_type,
            counters.same_count,
            counters.different_count
        );
        Ok(Some(pair_type))
    }

    /// Understanding page: checks one attempt at the comprehension questions.
    pub fn understanding(
        &self,
        pid: ParticipantId,
        answers: &ComprehensionAnswers,
    ) -> Result<ComprehensionOutcome, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        state.check_page(Page::Understanding)?;
        state.submit_understanding(answers)
    }

    /// Charity survey page.
    pub fn survey_charity(
        &self,
        pid: ParticipantId,
        charity_1: &str,
        charity_2: &str,
    ) -> Result<(), MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        state.check_page(Page::SurveyC)?;
        state.submit_charities(charity_1, charity_2)
    }

    /// Audit page display: the random draw, taken once per participant.
    pub fn audit_draw(&self, pid: ParticipantId) -> Result<u8, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        state.check_page(Page::Audit)?;
        let mut rng = self.rng.lock();
        Ok(state.report_draw_or_insert(&mut *rng))
    }

    /// Audit page submission: returns whether the manager is reported. Only the
    /// first submission counts.
    pub fn audit(&self, pid: ParticipantId, probability: i64) -> Result<bool, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        state.check_page(Page::Audit)?;
        let mut rng = self.rng.lock();
        state.submit_report_probability(probability, &mut *rng)
    }

    /// Dictator page: the amount the participant keeps.
    pub fn dictator(&self, pid: ParticipantId, keep: i64) -> Result<u8, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        state.check_page(Page::Dictator)?;
        state.submit_dictator_keep(keep)
    }

    /// Result page.
    pub fn result(&self, pid: ParticipantId) -> Result<PayoffRecord, MatchingErrors> {
        self.lock_participant(pid)?
            .payoff_record(&self.rules.payment)
    }

    /// Moves the participant to the next page.
    ///
    /// Leaving the Role page goes through matching first, so that nobody passes
    /// it without either a manager or a recorded reason for having none.
    ///
    /// A participant stays on the Painting page until they chose a painting, on the
    /// Understanding page until they answered every question correctly, and on the
    /// Audit page until they submitted a reporting probability.
    pub fn advance(&self, pid: ParticipantId) -> Result<Page, MatchingErrors> {
        let mut state = self.lock_participant(pid)?;
        let page = state.page();
        if page == Page::Role {
            if let Err(e) = self.match_participant(&mut state) {
                debug!("advance: participant {} leaves Role unmatched: {}", pid, e);
            }
        }
        let blocked = match page {
            Page::Painting => state.preference().is_none(),
            Page::Understanding => !state.understanding_passed(),
            Page::Audit => state.report().is_none(),
            _ => false,
        };
        if blocked {
            return Err(MatchingErrors::PageBlocked {
                participant: pid,
                page,
            });
        }
        state.page = page.next();
        debug!("advance: participant {} {:?} -> {:?}", pid, page, state.page);
        Ok(state.page)
    }
}
