use crate::config::*;

/// Why a participant ended up without a manager.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UnmatchedReason {
    /// The manager dataset could not be loaded for this session.
    NoManagerData,
    /// All the managers were handed out before this participant.
    PoolExhausted,
}

/// Everything the session knows about one participant.
///
/// Most fields are filled by one page and read by later pages, so they stay
/// empty until the corresponding page has been submitted. The `*_or_default`
/// accessors substitute the values shown to participants when a field is empty.
#[derive(PartialEq, Debug, Clone)]
pub struct ParticipantState {
    pub(crate) id: ParticipantId,
    pub(crate) page: Page,
    pub(crate) assignment: Option<Assignment>,
    pub(crate) unmatched: Option<(UnmatchedReason, MatchingErrors)>,
    pub(crate) prefer: Option<Preference>,
    pub(crate) pair_type: Option<PairType>,
    pub(crate) understanding_attempts: u32,
    pub(crate) understanding_first_try_correct: Option<bool>,
    pub(crate) understanding_passed: bool,
    pub(crate) report_draw: Option<u8>,
    pub(crate) report_probability: Option<u8>,
    pub(crate) report: Option<bool>,
    pub(crate) charity_1: Option<String>,
    pub(crate) charity_2: Option<String>,
    pub(crate) dictator_keep: Option<u8>,
}

impl ParticipantState {
    pub fn new(id: ParticipantId) -> ParticipantState {
        ParticipantState {
            id,
            page: Page::Role,
            assignment: None,
            unmatched: None,
            prefer: None,
            pair_type: None,
            understanding_attempts: 0,
            understanding_first_try_correct: None,
            understanding_passed: false,
            report_draw: None,
            report_probability: None,
            report: None,
            charity_1: None,
            charity_2: None,
            dictator_keep: None,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// The assigned manager. Fails if the participant was never matched.
    pub fn assignment(&self) -> Result<&Assignment, MatchingErrors> {
        self.assignment
            .as_ref()
            .ok_or(MatchingErrors::MissingAssignment {
                participant: self.id,
            })
    }

    pub fn maybe_assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    pub fn unmatched_reason(&self) -> Option<UnmatchedReason> {
        self.unmatched.as_ref().map(|(r, _)| *r)
    }

    pub fn preference(&self) -> Option<Preference> {
        self.prefer
    }

    pub fn pair_type(&self) -> Option<PairType> {
        self.pair_type
    }

    pub fn understanding_attempts(&self) -> u32 {
        self.understanding_attempts
    }

    /// False until the first attempt has been submitted and was fully correct.
    pub fn understanding_first_try_correct(&self) -> bool {
        self.understanding_first_try_correct.unwrap_or(false)
    }

    pub fn understanding_passed(&self) -> bool {
        self.understanding_passed
    }

    pub fn report_draw(&self) -> Option<u8> {
        self.report_draw
    }

    pub fn report_probability(&self) -> Option<u8> {
        self.report_probability
    }

    pub fn report(&self) -> Option<bool> {
        self.report
    }

    /// The charity the participant identifies with.
    pub fn charity_1(&self) -> Option<&str> {
        self.charity_1.as_deref()
    }

    /// The charity the participant would prefer their organization to donate to.
    pub fn charity_2(&self) -> Option<&str> {
        self.charity_2.as_deref()
    }

    /// Amount kept in the dictator game, out of `DICTATOR_ENDOWMENT`.
    pub fn dictator_keep(&self) -> Option<u8> {
        self.dictator_keep
    }

    /// Fails unless the participant is currently on `page`.
    pub fn check_page(&self, page: Page) -> Result<(), MatchingErrors> {
        if self.page == page {
            Ok(())
        } else {
            Err(MatchingErrors::WrongPage {
                participant: self.id,
                expected: page,
                current: self.page,
            })
        }
    }

    /// Stores both charity answers. Each must name one of the organizations.
    pub fn submit_charities(
        &mut self,
        charity_1: &str,
        charity_2: &str,
    ) -> Result<(), MatchingErrors> {
        let c1 = parse_charity(charity_1)?;
        let c2 = parse_charity(charity_2)?;
        self.charity_1 = Some(c1);
        self.charity_2 = Some(c2);
        Ok(())
    }

    pub fn submit_dictator_keep(&mut self, keep: i64) -> Result<u8, MatchingErrors> {
        if !(0..=DICTATOR_ENDOWMENT).contains(&keep) {
            return Err(MatchingErrors::InvalidAllocation { value: keep });
        }
        self.dictator_keep = Some(keep as u8);
        Ok(keep as u8)
    }

    pub fn manager_id_or_default(&self) -> &str {
        self.assignment
            .as_ref()
            .map_or(NOT_MATCHED, |a| a.manager_id.as_str())
    }

    pub fn team_or_default(&self) -> &str {
        self.assignment
            .as_ref()
            .map_or(NOT_ASSIGNED, |a| a.team_label.as_str())
    }

    pub fn organization_or_default(&self) -> &str {
        self.assignment
            .as_ref()
            .map_or(NOT_ASSIGNED, |a| a.organization.as_str())
    }

    pub fn manager_preference_or_default(&self) -> &str {
        self.assignment
            .as_ref()
            .map_or(NOT_AVAILABLE, |a| a.manager_preference.as_str())
    }

    pub fn stated_amount_or_default(&self) -> &str {
        self.assignment
            .as_ref()
            .and_then(|a| a.stated_amount.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn correct_amount_or_default(&self) -> &str {
        self.assignment
            .as_ref()
            .and_then(|a| a.correct_amount.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn threshold_or_default(&self) -> i64 {
        self.assignment
            .as_ref()
            .map_or(DEFAULT_THRESHOLD_INTEGER, |a| a.threshold_integer)
    }

    pub(crate) fn mark_unmatched(&mut self, reason: UnmatchedReason, err: MatchingErrors) {
        self.unmatched = Some((reason, err));
    }

    pub(crate) fn unmatched_error(&self) -> Option<MatchingErrors> {
        self.unmatched.as_ref().map(|(_, e)| e.clone())
    }
}

fn parse_charity(s: &str) -> Result<String, MatchingErrors> {
    let s = s.trim();
    ORGANIZATIONS
        .iter()
        .find(|o| **o == s)
        .map(|o| o.to_string())
        .ok_or(MatchingErrors::InvalidCharity {
            value: s.to_string(),
        })
}
