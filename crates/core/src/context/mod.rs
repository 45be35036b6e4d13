//! Per-session transaction state: user details, per-domain details and the
//! ordered step history each domain accumulates.
//!
//! The context is the single source of truth consulted before and after every
//! step. It is mutated only through its own operations and enforces the
//! canonical-order invariant on every history write.

pub mod history;
pub mod identifiers;
pub mod snapshot;

use serde_json::Value;

use crate::domain::{
    params, Domain, DomainDetails, DomainDetailsPatch, Step, StepParams, UserDetails,
    UserDetailsPatch,
};
use crate::errors::StepError;

pub use history::{HistoryEntry, TransactionHistory};
pub use snapshot::{
    ContextSnapshot, InMemorySnapshotSink, JsonFileSnapshotSink, SessionSnapshot, SnapshotError,
    SnapshotSink, StepMarker,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DomainRecord {
    pub details: DomainDetails,
    pub history: TransactionHistory,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionContext {
    user_details: UserDetails,
    records: [DomainRecord; 4],
}

impl TransactionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_details(&self) -> &UserDetails {
        &self.user_details
    }

    pub fn domain_details(&self, domain: Domain) -> &DomainDetails {
        &self.record(domain).details
    }

    pub fn history(&self, domain: Domain) -> &TransactionHistory {
        &self.record(domain).history
    }

    pub fn record(&self, domain: Domain) -> &DomainRecord {
        &self.records[domain.index()]
    }

    fn record_mut(&mut self, domain: Domain) -> &mut DomainRecord {
        &mut self.records[domain.index()]
    }

    pub fn update_user_details(&mut self, patch: UserDetailsPatch) {
        self.user_details.merge(patch);
    }

    pub fn update_domain_details(&mut self, domain: Domain, patch: DomainDetailsPatch) {
        self.record_mut(domain).details.merge(patch);
    }

    /// Writes the response for `step`, overwriting any previous entry for it.
    ///
    /// Fails without touching the history when a canonical predecessor of
    /// `step` has no entry yet.
    pub fn record_step(
        &mut self,
        domain: Domain,
        step: Step,
        response: Value,
    ) -> Result<(), StepError> {
        let history = &mut self.record_mut(domain).history;
        if let Some(missing) = history.first_missing_before(step) {
            return Err(StepError::OutOfSequence { domain, requested: step, missing });
        }
        history.record(step, response);
        Ok(())
    }

    pub fn get_step_result(&self, domain: Domain, step: Step) -> Option<&Value> {
        self.history(domain).get(step)
    }

    pub fn get_order_identifier(&self, domain: Domain) -> Option<&str> {
        self.domain_details(domain).order_identifier()
    }

    /// One-way copy of name, phone and email into the domain's customer fields.
    pub fn copy_user_details_into(&mut self, domain: Domain) {
        let user = self.user_details.clone();
        let details = &mut self.record_mut(domain).details;
        details.customer_name = user.name;
        details.customer_phone = user.phone;
        details.customer_email = user.email;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Parameters `step` can reuse from what earlier steps stored for `domain`.
    pub fn step_defaults(&self, domain: Domain, step: Step) -> StepParams {
        let details = self.domain_details(domain);
        step.required_params()
            .iter()
            .filter_map(|key| {
                let value = match *key {
                    params::PROVIDER_ID => details.provider_id.as_deref(),
                    params::ITEM_ID => details.item_id.as_deref(),
                    params::FULFILLMENT_ID => details.fulfillment_id.as_deref(),
                    params::CUSTOMER_NAME => details.customer_name.as_deref(),
                    params::CUSTOMER_PHONE => details.customer_phone.as_deref(),
                    params::CUSTOMER_EMAIL => details.customer_email.as_deref(),
                    params::ORDER_ID => details.order_identifier(),
                    _ => None,
                };
                value.map(|value| (*key, value.to_string()))
            })
            .collect()
    }

    /// Records a successful step together with the identifiers it used and produced.
    ///
    /// A select, init or confirm that changes the stored selection drops the
    /// identifiers later steps produced for the old one.
    pub fn commit_step(
        &mut self,
        domain: Domain,
        step: Step,
        params: &StepParams,
        response: Value,
    ) -> Result<(), StepError> {
        let produced = identifiers::captured(step, &response);
        self.record_step(domain, step, response)?;

        let owned = |key: &str| params.get(key).map(str::to_string);
        let supplied = match step {
            Step::Search => DomainDetailsPatch::default(),
            Step::Select | Step::Init => DomainDetailsPatch {
                provider_id: owned(params::PROVIDER_ID),
                item_id: owned(params::ITEM_ID),
                ..DomainDetailsPatch::default()
            },
            Step::Confirm => DomainDetailsPatch {
                provider_id: owned(params::PROVIDER_ID),
                item_id: owned(params::ITEM_ID),
                fulfillment_id: owned(params::FULFILLMENT_ID),
                customer_name: owned(params::CUSTOMER_NAME),
                customer_phone: owned(params::CUSTOMER_PHONE),
                customer_email: owned(params::CUSTOMER_EMAIL),
                ..DomainDetailsPatch::default()
            },
            Step::Status => {
                DomainDetailsPatch { order_id: owned(params::ORDER_ID), ..DomainDetailsPatch::default() }
            }
        };

        let details = &mut self.record_mut(domain).details;
        if changes_selection(details, &supplied) {
            match step {
                Step::Select | Step::Init => {
                    details.fulfillment_id = None;
                    details.transaction_id = None;
                    details.order_id = None;
                }
                Step::Confirm => details.order_id = None,
                Step::Search | Step::Status => {}
            }
        }
        details.merge(supplied);
        details.merge(produced);
        Ok(())
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            user_details: self.user_details.clone(),
            domain_details: Domain::ALL
                .iter()
                .map(|domain| (*domain, self.domain_details(*domain).clone()))
                .collect(),
            transaction_history: Domain::ALL
                .iter()
                .map(|domain| (*domain, self.history(*domain).clone()))
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        let ContextSnapshot { user_details, mut domain_details, mut transaction_history } =
            snapshot;
        let mut context = Self { user_details, ..Self::default() };
        for domain in Domain::ALL {
            let record = context.record_mut(domain);
            record.details = domain_details.remove(&domain).unwrap_or_default();
            record.history = transaction_history.remove(&domain).unwrap_or_default();
        }
        context
    }
}

/// True when `patch` replaces a stored provider, item or fulfillment with a different one.
fn changes_selection(details: &DomainDetails, patch: &DomainDetailsPatch) -> bool {
    let differs = |stored: &Option<String>, supplied: &Option<String>| {
        matches!((stored, supplied), (Some(stored), Some(supplied)) if stored != supplied)
    };
    differs(&details.provider_id, &patch.provider_id)
        || differs(&details.item_id, &patch.item_id)
        || differs(&details.fulfillment_id, &patch.fulfillment_id)
}
