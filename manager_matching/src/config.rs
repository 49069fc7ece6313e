// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The painting a manager (or an employee) selected at the start of the game.
///
/// `Left` is the Klee painting, `Right` is the Kandinsky painting.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Preference {
    Left,
    Right,
}

impl Preference {
    pub const ALL: [Preference; 2] = [Preference::Left, Preference::Right];

    /// Parses the labels used in the datasets. Surrounding whitespace is ignored,
    /// the case is not.
    pub fn parse(s: &str) -> Option<Preference> {
        match s.trim() {
            "Left" => Some(Preference::Left),
            "Right" => Some(Preference::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preference::Left => "Left",
            Preference::Right => "Right",
        }
    }

    /// The painting label, which is also the team label for a manager preference.
    pub fn painting(&self) -> &'static str {
        match self {
            Preference::Left => "Klee",
            Preference::Right => "Kandinsky",
        }
    }
}

impl Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The charities an organization can donate to. An organization is drawn
/// uniformly from this list, independently of the manager.
pub const ORGANIZATIONS: [&str; 2] = ["Red Cross", "NRA"];

/// Amount split by the participant in the dictator game.
pub const DICTATOR_ENDOWMENT: i64 = 10;

/// Threshold shown to the participant when the dataset does not provide one.
pub const DEFAULT_THRESHOLD_INTEGER: i64 = 8;

pub const NOT_AVAILABLE: &str = "Not available";
pub const NOT_ASSIGNED: &str = "Not assigned";
pub const NOT_MATCHED: &str = "Not matched";

/// One row of the manager dataset.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ManagerRecord {
    pub id: String,
    pub preference: Preference,
    pub stated_amount: Option<String>,
    pub correct_amount: Option<String>,
    pub threshold_integer: Option<i64>,
}

impl ManagerRecord {
    pub fn new(id: &str, preference: Preference) -> ManagerRecord {
        ManagerRecord {
            id: id.to_string(),
            preference,
            stated_amount: None,
            correct_amount: None,
            threshold_integer: None,
        }
    }

    pub fn threshold_or_default(&self) -> i64 {
        self.threshold_integer.unwrap_or(DEFAULT_THRESHOLD_INTEGER)
    }
}

/// Participants are numbered from 1, in the order they joined the session.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ParticipantId(pub u32);

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ******** Output data structures *********

/// The manager snapshot attached to one participant.
///
/// Written once when the participant is matched, read by every later page.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Assignment {
    pub participant: ParticipantId,
    pub manager_id: String,
    pub manager_preference: Preference,
    pub team_label: String,
    pub organization: String,
    pub stated_amount: Option<String>,
    pub correct_amount: Option<String>,
    pub threshold_integer: i64,
    /// 1 for the first manager handed out in the session, and so on.
    pub order: u32,
    pub timestamp: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct BalanceCounters {
    pub same_count: u64,
    pub different_count: u64,
}

impl BalanceCounters {
    pub fn gap(&self) -> i64 {
        self.same_count as i64 - self.different_count as i64
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PairType {
    Same,
    Different,
}

impl PairType {
    pub fn of(employee: Preference, manager: Preference) -> PairType {
        if employee == manager {
            PairType::Same
        } else {
            PairType::Different
        }
    }

    pub fn is_same(&self) -> bool {
        matches!(self, PairType::Same)
    }
}

/// Errors that prevent a step of the session from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum MatchingErrors {
    /// Every manager of the pool has been handed out (or the pool is empty).
    PoolExhausted { participant: ParticipantId },
    /// A page needed the participant's manager, but none was ever assigned.
    MissingAssignment { participant: ParticipantId },
    /// A page needed the participant's own painting choice before it was made.
    MissingPreference { participant: ParticipantId },
    UnknownParticipant { participant: ParticipantId },
    DuplicateManager { id: String },
    /// Report probabilities are percentages.
    InvalidProbability { value: i64 },
    /// The participant cannot leave this page yet.
    PageBlocked { participant: ParticipantId, page: Page },
    /// A page was submitted while the participant is on another page.
    WrongPage {
        participant: ParticipantId,
        expected: Page,
        current: Page,
    },
    /// Charity answers must name one of the organizations.
    InvalidCharity { value: String },
    /// The dictator allocation is a whole amount between 0 and the endowment.
    InvalidAllocation { value: i64 },
}

impl Error for MatchingErrors {}

impl Display for MatchingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchingErrors::PoolExhausted { participant } => {
                write!(f, "no available manager left for participant {}", participant)
            }
            MatchingErrors::MissingAssignment { participant } => {
                write!(f, "participant {} has no assigned manager", participant)
            }
            MatchingErrors::MissingPreference { participant } => {
                write!(f, "participant {} has not selected a painting", participant)
            }
            MatchingErrors::UnknownParticipant { participant } => {
                write!(f, "participant {} is not part of this session", participant)
            }
            MatchingErrors::DuplicateManager { id } => {
                write!(f, "manager id {:?} appears more than once", id)
            }
            MatchingErrors::InvalidProbability { value } => {
                write!(f, "report probability {} is outside 0..=100", value)
            }
            MatchingErrors::PageBlocked { participant, page } => {
                write!(f, "participant {} cannot leave page {:?} yet", participant, page)
            }
            MatchingErrors::WrongPage {
                participant,
                expected,
                current,
            } => write!(
                f,
                "participant {} submitted page {:?} while on page {:?}",
                participant, expected, current
            ),
            MatchingErrors::InvalidCharity { value } => {
                write!(f, "unknown charity {:?}", value)
            }
            MatchingErrors::InvalidAllocation { value } => write!(
                f,
                "dictator allocation {} is outside 0..={}",
                value, DICTATOR_ENDOWMENT
            ),
        }
    }
}

// ********* Pages **********

/// The fixed sequence of pages every participant goes through.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Page {
    Role,
    Painting,
    MatchingResult,
    Charity,
    SurveyC,
    Organization,
    Understanding,
    BeforeIqTest,
    MisreportingRule2,
    Score,
    Audit,
    SurveyM,
    SurveyO,
    Big5,
    Comparison,
    Dictator,
    Info,
    Result,
}

impl Page {
    pub const SEQUENCE: [Page; 18] = [
        Page::Role,
        Page::Painting,
        Page::MatchingResult,
        Page::Charity,
        Page::SurveyC,
        Page::Organization,
        Page::Understanding,
        Page::BeforeIqTest,
        Page::MisreportingRule2,
        Page::Score,
        Page::Audit,
        Page::SurveyM,
        Page::SurveyO,
        Page::Big5,
        Page::Comparison,
        Page::Dictator,
        Page::Info,
        Page::Result,
    ];

    pub fn index(&self) -> usize {
        Page::SEQUENCE
            .iter()
            .position(|p| p == self)
            .unwrap_or(Page::SEQUENCE.len() - 1)
    }

    /// The page after this one. `Result` is the last page and stays put.
    pub fn next(&self) -> Page {
        let idx = self.index();
        Page::SEQUENCE[(idx + 1).min(Page::SEQUENCE.len() - 1)]
    }
}

// ********* Configuration **********

/// How managers are handed out to participants.
///
/// - Reactive matches each participant when they reach the Role page, looking at
/// the pair balance observed so far. Results depend on arrival order.
///
/// - PreAllocate computes every assignment once when the session is created,
/// alternating between Left and Right managers. Results only depend on the seed.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AssignmentMode {
    Reactive,
    PreAllocate,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PaymentRules {
    /// Paid to the manager whether or not they were reported.
    pub base_payment: f64,
    /// Stated amounts above this value earn a bonus.
    pub bonus_threshold: i64,
    pub bonus_rate: f64,
    pub bonus_cap: f64,
    /// Fixed payoff of the participant, reported next to the manager payment.
    pub participation_payoff: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct MatchingRules {
    pub assignment_mode: AssignmentMode,
    /// The reactive engine starts biasing once |gap| exceeds this value.
    pub balance_threshold: i64,
    pub bias_base: f64,
    pub bias_step: f64,
    pub bias_cap: f64,
    pub payment: PaymentRules,
}

impl MatchingRules {
    pub const DEFAULT_RULES: MatchingRules = MatchingRules {
        assignment_mode: AssignmentMode::PreAllocate,
        balance_threshold: 2,
        bias_base: 0.5,
        bias_step: 0.1,
        bias_cap: 0.8,
        payment: PaymentRules {
            base_payment: 0.67,
            bonus_threshold: 8,
            bonus_rate: 0.5,
            bonus_cap: 2.0,
            participation_payoff: 0.0,
        },
    };
}
