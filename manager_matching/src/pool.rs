use log::debug;

use std::collections::{HashMap, HashSet};

use crate::config::*;

/// The managers available to a session, in dataset order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ManagerPool {
    records: Vec<ManagerRecord>,
    // Indexes into `records`, in dataset order.
    by_preference: HashMap<Preference, Vec<usize>>,
}

impl ManagerPool {
    /// Builds a pool. Manager ids must be unique.
    pub fn new(records: Vec<ManagerRecord>) -> Result<ManagerPool, MatchingErrors> {
        let mut seen: HashSet<&str> = HashSet::new();
        for r in records.iter() {
            if !seen.insert(r.id.as_str()) {
                return Err(MatchingErrors::DuplicateManager { id: r.id.clone() });
            }
        }
        let mut by_preference: HashMap<Preference, Vec<usize>> = HashMap::new();
        for (idx, r) in records.iter().enumerate() {
            by_preference.entry(r.preference).or_default().push(idx);
        }
        debug!(
            "ManagerPool::new: {} managers, left: {}, right: {}",
            records.len(),
            by_preference.get(&Preference::Left).map_or(0, |v| v.len()),
            by_preference.get(&Preference::Right).map_or(0, |v| v.len())
        );
        Ok(ManagerPool {
            records,
            by_preference,
        })
    }

    /// The pool used when the dataset could not be loaded. Every assignment fails.
    pub fn empty() -> ManagerPool {
        ManagerPool::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ManagerRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ManagerRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn with_preference(&self, pref: Preference) -> Vec<&ManagerRecord> {
        self.by_preference
            .get(&pref)
            .map(|idxs| idxs.iter().map(|idx| &self.records[*idx]).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, pref: Preference) -> usize {
        self.by_preference.get(&pref).map_or(0, |v| v.len())
    }
}

/// The managers already handed out, in the order they were handed out.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct UsedManagers {
    order: Vec<String>,
    ids: HashSet<String>,
}

impl UsedManagers {
    pub fn new() -> UsedManagers {
        UsedManagers::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Returns a copy with one more manager. The order of the new manager is the
    /// length of the returned set.
    pub fn with(&self, id: &str) -> UsedManagers {
        let mut res = self.clone();
        if res.ids.insert(id.to_string()) {
            res.order.push(id.to_string());
        }
        res
    }

    /// The managers of the pool that have not been handed out yet, in pool order.
    pub fn available<'a>(&self, pool: &'a ManagerPool) -> Vec<&'a ManagerRecord> {
        pool.records()
            .iter()
            .filter(|r| !self.contains(&r.id))
            .collect()
    }
}
