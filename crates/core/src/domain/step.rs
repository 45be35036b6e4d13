use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StepError;

/// Canonical transaction operations. The derived ordering is the canonical step order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Search,
    Select,
    Init,
    Confirm,
    Status,
}

impl Step {
    pub const ALL: [Step; 5] = [Step::Search, Step::Select, Step::Init, Step::Confirm, Step::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Select => "select",
            Self::Init => "init",
            Self::Confirm => "confirm",
            Self::Status => "status",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Search => 0,
            Self::Select => 1,
            Self::Init => 2,
            Self::Confirm => 3,
            Self::Status => 4,
        }
    }

    pub fn predecessor(&self) -> Option<Step> {
        match self {
            Self::Search => None,
            Self::Select => Some(Self::Search),
            Self::Init => Some(Self::Select),
            Self::Confirm => Some(Self::Init),
            Self::Status => Some(Self::Confirm),
        }
    }

    pub fn predecessors(&self) -> &'static [Step] {
        &Self::ALL[..self.index()]
    }

    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Search => &[],
            Self::Select | Self::Init => &[params::PROVIDER_ID, params::ITEM_ID],
            Self::Confirm => &[
                params::PROVIDER_ID,
                params::ITEM_ID,
                params::FULFILLMENT_ID,
                params::CUSTOMER_NAME,
                params::CUSTOMER_PHONE,
                params::CUSTOMER_EMAIL,
            ],
            Self::Status => &[params::ORDER_ID],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = StepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "select" => Ok(Self::Select),
            "init" => Ok(Self::Init),
            "confirm" => Ok(Self::Confirm),
            "status" => Ok(Self::Status),
            _ => Err(StepError::UnknownStep(value.to_string())),
        }
    }
}

pub mod params {
    pub const PROVIDER_ID: &str = "provider_id";
    pub const ITEM_ID: &str = "item_id";
    pub const FULFILLMENT_ID: &str = "fulfillment_id";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const CUSTOMER_PHONE: &str = "customer_phone";
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    pub const ORDER_ID: &str = "order_id";
}

/// Argument mapping supplied by the caller for one step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepParams(BTreeMap<String, String>);

impl StepParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value for `key` when present and not blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|value| !value.trim().is_empty())
    }

    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required.iter().filter(|key| self.get(key).is_none()).map(|key| key.to_string()).collect()
    }

    /// Caller-supplied values win over `defaults`; blank caller values fall back.
    pub fn merged_over(self, defaults: StepParams) -> StepParams {
        let mut merged = defaults;
        for (key, value) in self.0 {
            if !value.trim().is_empty() || !merged.0.contains_key(&key) {
                merged.0.insert(key, value);
            }
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for StepParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

/// A validated, typed protocol request for one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepRequest {
    Search,
    Select { provider_id: String, item_id: String },
    Init { provider_id: String, item_id: String },
    Confirm {
        provider_id: String,
        item_id: String,
        fulfillment_id: String,
        customer_name: String,
        customer_phone: String,
        customer_email: String,
    },
    Status { order_id: String },
}

impl StepRequest {
    pub fn from_params(step: Step, params: &StepParams) -> Result<Self, Vec<String>> {
        let missing = params.missing(step.required_params());
        if !missing.is_empty() {
            return Err(missing);
        }

        let take = |key: &str| params.get(key).unwrap_or_default().to_string();
        Ok(match step {
            Step::Search => Self::Search,
            Step::Select => {
                Self::Select { provider_id: take(params::PROVIDER_ID), item_id: take(params::ITEM_ID) }
            }
            Step::Init => {
                Self::Init { provider_id: take(params::PROVIDER_ID), item_id: take(params::ITEM_ID) }
            }
            Step::Confirm => Self::Confirm {
                provider_id: take(params::PROVIDER_ID),
                item_id: take(params::ITEM_ID),
                fulfillment_id: take(params::FULFILLMENT_ID),
                customer_name: take(params::CUSTOMER_NAME),
                customer_phone: take(params::CUSTOMER_PHONE),
                customer_email: take(params::CUSTOMER_EMAIL),
            },
            Step::Status => Self::Status { order_id: take(params::ORDER_ID) },
        })
    }

    pub fn step(&self) -> Step {
        match self {
            Self::Search => Step::Search,
            Self::Select { .. } => Step::Select,
            Self::Init { .. } => Step::Init,
            Self::Confirm { .. } => Step::Confirm,
            Self::Status { .. } => Step::Status,
        }
    }
}
