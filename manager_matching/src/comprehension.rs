use log::{debug, info, warn};

use crate::config::*;
use crate::participant::ParticipantState;

/// The four questions of the understanding check.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ComprehensionQuestion {
    /// The painting the participant selected.
    OwnPainting,
    /// The painting the manager selected.
    ManagerPainting,
    /// The painting that represents the team.
    TeamPainting,
    /// The charity the organization donated to.
    OrganizationCharity,
}

impl ComprehensionQuestion {
    pub const ALL: [ComprehensionQuestion; 4] = [
        ComprehensionQuestion::OwnPainting,
        ComprehensionQuestion::ManagerPainting,
        ComprehensionQuestion::TeamPainting,
        ComprehensionQuestion::OrganizationCharity,
    ];

    /// Name of the form field.
    pub fn field(&self) -> &'static str {
        match self {
            ComprehensionQuestion::OwnPainting => "choiceE",
            ComprehensionQuestion::ManagerPainting => "choiceM",
            ComprehensionQuestion::TeamPainting => "choiceT",
            ComprehensionQuestion::OrganizationCharity => "choiceO",
        }
    }

    pub fn error_label(&self) -> &'static str {
        match self {
            ComprehensionQuestion::OwnPainting => "Question 1 (Your painting): Incorrect answer.",
            ComprehensionQuestion::ManagerPainting => {
                "Question 2 (Manager's painting): Incorrect answer."
            }
            ComprehensionQuestion::TeamPainting => "Question 3 (Team painting): Incorrect answer.",
            ComprehensionQuestion::OrganizationCharity => {
                "Question 4 (Organization's charity): Incorrect answer."
            }
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ComprehensionAnswers {
    pub choice_e: String,
    pub choice_m: String,
    pub choice_t: String,
    pub choice_o: String,
}

impl ComprehensionAnswers {
    pub fn new(choice_e: &str, choice_m: &str, choice_t: &str, choice_o: &str) -> Self {
        ComprehensionAnswers {
            choice_e: choice_e.to_string(),
            choice_m: choice_m.to_string(),
            choice_t: choice_t.to_string(),
            choice_o: choice_o.to_string(),
        }
    }

    pub fn get(&self, q: ComprehensionQuestion) -> &str {
        match q {
            ComprehensionQuestion::OwnPainting => &self.choice_e,
            ComprehensionQuestion::ManagerPainting => &self.choice_m,
            ComprehensionQuestion::TeamPainting => &self.choice_t,
            ComprehensionQuestion::OrganizationCharity => &self.choice_o,
        }
    }
}

/// The answers a participant is expected to give, given their manager and their
/// own painting.
pub fn expected_answers(assignment: &Assignment, own: Preference) -> ComprehensionAnswers {
    ComprehensionAnswers::new(
        own.painting(),
        assignment.manager_preference.painting(),
        &assignment.team_label,
        &assignment.organization,
    )
}

/// Returns the questions with a wrong answer, in question order.
pub fn check_answers(
    expected: &ComprehensionAnswers,
    submitted: &ComprehensionAnswers,
) -> Vec<ComprehensionQuestion> {
    ComprehensionQuestion::ALL
        .iter()
        .filter(|q| expected.get(**q) != submitted.get(**q))
        .copied()
        .collect()
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ComprehensionOutcome {
    Passed {
        attempts: u32,
        first_try: bool,
    },
    Incorrect {
        attempts: u32,
        errors: Vec<ComprehensionQuestion>,
    },
}

impl ComprehensionOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ComprehensionOutcome::Passed { .. })
    }

    /// The message shown back to the participant, if any.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ComprehensionOutcome::Passed { .. } => None,
            ComprehensionOutcome::Incorrect { errors, .. } => {
                let mut lines: Vec<String> = vec![
                    "Please review your answers. The following questions are incorrect:"
                        .to_string(),
                ];
                lines.extend(errors.iter().map(|q| q.error_label().to_string()));
                lines.push("Please correct your answers and try again.".to_string());
                Some(lines.join("\n"))
            }
        }
    }
}

impl ParticipantState {
    /// Checks one submission of the understanding questions.
    ///
    /// Participants can retry as often as they want; only the result of the first
    /// attempt is kept in `understanding_first_try_correct`. A participant without
    /// a manager or without a painting choice gets an error and the attempt is
    /// not counted.
    pub fn submit_understanding(
        &mut self,
        answers: &ComprehensionAnswers,
    ) -> Result<ComprehensionOutcome, MatchingErrors> {
        let own = self.prefer.ok_or(MatchingErrors::MissingPreference {
            participant: self.id,
        })?;
        let expected = expected_answers(self.assignment()?, own);

        self.understanding_attempts += 1;
        let attempts = self.understanding_attempts;
        let errors = check_answers(&expected, answers);
        debug!(
            "submit_understanding: participant {} attempt {} expected {:?} submitted {:?}",
            self.id, attempts, expected, answers
        );

        if attempts == 1 {
            self.understanding_first_try_correct = Some(errors.is_empty());
        }
        if errors.is_empty() {
            self.understanding_passed = true;
            info!(
                "Participant {} passed the understanding check (attempt {})",
                self.id, attempts
            );
            Ok(ComprehensionOutcome::Passed {
                attempts,
                first_try: self.understanding_first_try_correct(),
            })
        } else {
            warn!(
                "Participant {} failed the understanding check (attempt {}): {:?}",
                self.id, attempts, errors
            );
            Ok(ComprehensionOutcome::Incorrect { attempts, errors })
        }
    }
}
