use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::identifiers;
use crate::domain::{Domain, Step};
use crate::errors::StepError;
use crate::sequencer::StepState;

pub const DEFAULT_TERMINAL_STATUSES: [&str; 5] =
    ["completed", "delivered", "active", "approved", "granted"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "domain")]
pub enum NextDomain {
    Domain(Domain),
    AllComplete,
}

impl fmt::Display for NextDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => write!(f, "{domain}"),
            Self::AllComplete => f.write_str("all_complete"),
        }
    }
}

/// Status codes that mean a domain's order has reached its end state. Matched case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusVocabulary {
    terminal: BTreeSet<String>,
}

impl StatusVocabulary {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terminal = codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_ascii_lowercase())
            .filter(|code| !code.is_empty())
            .collect();
        Self { terminal }
    }

    pub fn is_terminal(&self, code: &str) -> bool {
        self.terminal.contains(&code.trim().to_ascii_lowercase())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.terminal.iter().map(String::as_str)
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINAL_STATUSES)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Lane {
    domain: Domain,
    finished: bool,
}

/// Gates which domain workflow may run: connection, solar retail, solar service, then subsidy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Orchestrator {
    lanes: [Lane; 4],
    vocabulary: StatusVocabulary,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_vocabulary(StatusVocabulary::default())
    }

    pub fn with_vocabulary(vocabulary: StatusVocabulary) -> Self {
        let lanes = Domain::ALL.map(|domain| Lane { domain, finished: false });
        Self { lanes, vocabulary }
    }

    pub fn vocabulary(&self) -> &StatusVocabulary {
        &self.vocabulary
    }

    pub fn next_domain(&self) -> NextDomain {
        self.lanes
            .iter()
            .find(|lane| !lane.finished)
            .map(|lane| NextDomain::Domain(lane.domain))
            .unwrap_or(NextDomain::AllComplete)
    }

    /// The admitted domain may run any step; a finished domain may only re-poll `status`.
    pub fn admit(&self, domain: Domain, step: Step) -> Result<(), StepError> {
        let admitted = self.next_domain();
        if admitted == NextDomain::Domain(domain) {
            return Ok(());
        }
        if step == Step::Status && self.is_finished(domain) {
            return Ok(());
        }
        Err(StepError::OutOfOrderDomain { requested: domain, admitted })
    }

    pub fn mark_finished(&mut self, domain: Domain) {
        self.lanes[domain.index()].finished = true;
    }

    pub fn is_finished(&self, domain: Domain) -> bool {
        self.lanes[domain.index()].finished
    }

    pub fn finished_domains(&self) -> Vec<Domain> {
        self.lanes.iter().filter(|lane| lane.finished).map(|lane| lane.domain).collect()
    }

    /// Marks `domain` finished when its status check reports a terminal code.
    /// Returns whether the domain is finished afterwards.
    pub fn observe_status(&mut self, domain: Domain, state: StepState, response: &Value) -> bool {
        if state == StepState::StatusChecked
            && identifiers::status_code(response).is_some_and(|code| self.vocabulary.is_terminal(&code))
        {
            self.mark_finished(domain);
        }
        self.is_finished(domain)
    }

    pub fn restore(&mut self, finished: &[Domain]) {
        for lane in &mut self.lanes {
            lane.finished = finished.contains(&lane.domain);
        }
    }

    pub fn reset(&mut self) {
        self.restore(&[]);
    }
}
