use serde::{Deserialize, Serialize};

use crate::context::TransactionHistory;
use crate::domain::{Domain, Step};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepState {
    #[default]
    NotStarted,
    Searched,
    Selected,
    Initialized,
    Confirmed,
    StatusChecked,
}

impl StepState {
    /// State reached once `step` has completed.
    pub fn after(step: Step) -> Self {
        match step {
            Step::Search => Self::Searched,
            Step::Select => Self::Selected,
            Step::Init => Self::Initialized,
            Step::Confirm => Self::Confirmed,
            Step::Status => Self::StatusChecked,
        }
    }

    pub fn last_completed(&self) -> Option<Step> {
        match self {
            Self::NotStarted => None,
            Self::Searched => Some(Step::Search),
            Self::Selected => Some(Step::Select),
            Self::Initialized => Some(Step::Init),
            Self::Confirmed => Some(Step::Confirm),
            Self::StatusChecked => Some(Step::Status),
        }
    }

    /// The step this state moves forward with. `StatusChecked` re-enters on `Status`.
    pub fn next_step(&self) -> Step {
        match self {
            Self::NotStarted => Step::Search,
            Self::Searched => Step::Select,
            Self::Selected => Step::Init,
            Self::Initialized => Step::Confirm,
            Self::Confirmed | Self::StatusChecked => Step::Status,
        }
    }

    pub fn has_completed(&self, step: Step) -> bool {
        self.last_completed().is_some_and(|last| step <= last)
    }

    pub fn from_history(history: &TransactionHistory) -> Self {
        history.last_contiguous_step().map(Self::after).unwrap_or_default()
    }
}

/// Permission to run one step, produced by validation and consumed by `advance`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepApproval {
    pub domain: Domain,
    pub step: Step,
    pub from: StepState,
    pub to: StepState,
    pub replay: bool,
}
