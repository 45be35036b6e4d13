use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Step;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: Step,
    pub response: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Ordered step -> response record for one domain. Insertion order is the audit trail.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHistory {
    entries: Vec<HistoryEntry>,
}

impl TransactionHistory {
    pub fn get(&self, step: Step) -> Option<&Value> {
        self.entry(step).map(|entry| &entry.response)
    }

    pub fn entry(&self, step: Step) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.step == step)
    }

    pub fn contains(&self, step: Step) -> bool {
        self.entry(step).is_some()
    }

    /// First predecessor of `step` (in canonical order) without an entry.
    pub fn first_missing_before(&self, step: Step) -> Option<Step> {
        step.predecessors().iter().copied().find(|predecessor| !self.contains(*predecessor))
    }

    /// Overwrites an existing entry in place; appends otherwise.
    pub(crate) fn record(&mut self, step: Step, response: Value) {
        let recorded_at = Utc::now();
        match self.entries.iter_mut().find(|entry| entry.step == step) {
            Some(entry) => {
                entry.response = response;
                entry.recorded_at = recorded_at;
            }
            None => self.entries.push(HistoryEntry { step, response, recorded_at }),
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn steps(&self) -> Vec<Step> {
        self.entries.iter().map(|entry| entry.step).collect()
    }

    /// Furthest canonical step reached without gaps.
    pub fn last_contiguous_step(&self) -> Option<Step> {
        Step::ALL.iter().copied().take_while(|step| self.contains(*step)).last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::TransactionHistory;
    use crate::domain::Step;

    #[test]
    fn rerecording_overwrites_in_place() {
        let mut history = TransactionHistory::default();
        history.record(Step::Search, json!({"attempt": 1}));
        history.record(Step::Select, json!({"picked": true}));
        history.record(Step::Search, json!({"attempt": 2}));

        assert_eq!(history.len(), 2);
        assert_eq!(history.steps(), vec![Step::Search, Step::Select]);
        assert_eq!(history.get(Step::Search), Some(&json!({"attempt": 2})));
    }

    #[test]
    fn first_missing_predecessor_is_reported_in_canonical_order() {
        let mut history = TransactionHistory::default();
        assert_eq!(history.first_missing_before(Step::Search), None);
        assert_eq!(history.first_missing_before(Step::Init), Some(Step::Search));

        history.record(Step::Search, json!({}));
        assert_eq!(history.first_missing_before(Step::Confirm), Some(Step::Select));
        assert_eq!(history.last_contiguous_step(), Some(Step::Search));
    }
}
