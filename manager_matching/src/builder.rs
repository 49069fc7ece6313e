pub use crate::config::*;
use crate::pool::ManagerPool;
use crate::session::Session;

/// A builder for setting up a session.
///
/// ```
/// pub use manager_matching::builder::Builder;
/// pub use manager_matching::{MatchingRules, ParticipantId, Preference};
/// # use manager_matching::MatchingErrors;
///
/// let mut builder = Builder::new(&MatchingRules::DEFAULT_RULES)?
///     .participants(2)?
///     .seed(42);
///
/// builder.add_manager_simple("m1", Preference::Left)?;
/// builder.add_manager_simple("m2", Preference::Right)?;
///
/// let session = builder.build()?;
/// let assignment = session.role(ParticipantId(1))?;
/// assert_eq!(assignment.manager_preference, Preference::Left);
///
/// # Ok::<(), MatchingErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: MatchingRules,
    pub(crate) _participants: usize,
    pub(crate) _seed: Option<u64>,
    pub(crate) _managers: Vec<ManagerRecord>,
}

impl Builder {
    pub fn new(rules: &MatchingRules) -> Result<Builder, MatchingErrors> {
        Ok(Builder {
            _rules: rules.clone(),
            _participants: 0,
            _seed: None,
            _managers: Vec::new(),
        })
    }

    pub fn participants(self, count: usize) -> Result<Builder, MatchingErrors> {
        Ok(Builder {
            _participants: count,
            ..self
        })
    }

    /// Fixes the random draws of the session. Without a seed, every session is
    /// different.
    pub fn seed(self, seed: u64) -> Builder {
        Builder {
            _seed: Some(seed),
            ..self
        }
    }

    /// Adds a manager with only an id and a painting.
    ///
    /// The stated amount and the correct amount are left empty, and the threshold
    /// takes its default value.
    pub fn add_manager_simple(
        &mut self,
        id: &str,
        preference: Preference,
    ) -> Result<(), MatchingErrors> {
        self.add_manager(&ManagerRecord::new(id, preference))
    }

    /// Adds a full manager record. Ids must be unique.
    pub fn add_manager(&mut self, record: &ManagerRecord) -> Result<(), MatchingErrors> {
        if self._managers.iter().any(|m| m.id == record.id) {
            return Err(MatchingErrors::DuplicateManager {
                id: record.id.clone(),
            });
        }
        self._managers.push(record.clone());
        Ok(())
    }

    pub fn build(self) -> Result<Session, MatchingErrors> {
        let pool = ManagerPool::new(self._managers)?;
        Ok(Session::new(
            pool,
            self._participants,
            &self._rules,
            self._seed,
        ))
    }
}
