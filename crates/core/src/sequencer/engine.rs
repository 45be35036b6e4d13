use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::context::TransactionContext;
use crate::domain::{Domain, Step, StepParams};
use crate::errors::StepError;
use crate::sequencer::states::{StepApproval, StepState};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepSequencer {
    states: [StepState; 4],
}

impl StepSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds every domain's state from the recorded history.
    pub fn from_context(context: &TransactionContext) -> Self {
        let states = Domain::ALL.map(|domain| StepState::from_history(context.history(domain)));
        Self { states }
    }

    pub fn state(&self, domain: Domain) -> StepState {
        self.states[domain.index()]
    }

    /// Checks parameters, then the state machine, then the recorded history. Never mutates.
    pub fn validate(
        &self,
        context: &TransactionContext,
        domain: Domain,
        step: Step,
        params: &StepParams,
    ) -> Result<StepApproval, StepError> {
        let missing = params.missing(step.required_params());
        if !missing.is_empty() {
            return Err(StepError::MissingParameter { domain, step, missing });
        }

        let from = self.state(domain);
        let (to, replay) = transition(domain, from, step)?;

        if let Some(missing) = context.history(domain).first_missing_before(step) {
            return Err(StepError::OutOfSequence { domain, requested: step, missing });
        }

        Ok(StepApproval { domain, step, from, to, replay })
    }

    /// Applies an approval. Replays never move state backward.
    pub fn advance(&mut self, approval: &StepApproval) {
        if !approval.replay {
            self.states[approval.domain.index()] = approval.to;
        }
    }

    pub fn validate_and_advance(
        &mut self,
        context: &TransactionContext,
        domain: Domain,
        step: Step,
        params: &StepParams,
    ) -> Result<StepApproval, StepError> {
        let approval = self.validate(context, domain, step, params)?;
        self.advance(&approval);
        Ok(approval)
    }

    pub fn validate_with_audit<S>(
        &self,
        context: &TransactionContext,
        domain: Domain,
        step: Step,
        params: &StepParams,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<StepApproval, StepError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.validate(context, domain, step, params);
        match &result {
            Ok(approval) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        Some(domain),
                        "sequencer.step_approved",
                        AuditCategory::Sequencing,
                        AuditOutcome::Success,
                    )
                    .with_metadata("step", step.as_str())
                    .with_metadata("from", format!("{:?}", approval.from))
                    .with_metadata("to", format!("{:?}", approval.to))
                    .with_metadata("replay", approval.replay.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        Some(domain),
                        "sequencer.step_rejected",
                        AuditCategory::Sequencing,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("step", step.as_str())
                    .with_metadata("error_class", error.error_class())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    pub fn reset(&mut self) {
        self.states = [StepState::NotStarted; 4];
    }
}

fn transition(domain: Domain, current: StepState, step: Step) -> Result<(StepState, bool), StepError> {
    use StepState::{Confirmed, Initialized, NotStarted, Searched, Selected, StatusChecked};

    let to = match (current, step) {
        (NotStarted, Step::Search) => Searched,
        (Searched, Step::Select) => Selected,
        (Selected, Step::Init) => Initialized,
        (Initialized, Step::Confirm) => Confirmed,
        (Confirmed, Step::Status) | (StatusChecked, Step::Status) => StatusChecked,
        (state, step) if state.has_completed(step) => return Ok((state, true)),
        (state, step) => {
            return Err(StepError::OutOfSequence {
                domain,
                requested: step,
                missing: state.next_step(),
            });
        }
    };

    Ok((to, false))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::context::TransactionContext;
    use crate::domain::{params, Domain, Step, StepParams};
    use crate::errors::StepError;
    use crate::sequencer::engine::StepSequencer;
    use crate::sequencer::states::StepState;

    fn full_params() -> StepParams {
        StepParams::new()
            .with(params::PROVIDER_ID, "prov_1")
            .with(params::ITEM_ID, "item_1")
            .with(params::FULFILLMENT_ID, "ful_1")
            .with(params::CUSTOMER_NAME, "Lisa")
            .with(params::CUSTOMER_PHONE, "876756454")
            .with(params::CUSTOMER_EMAIL, "lisa@example.com")
            .with(params::ORDER_ID, "txn_9")
    }

    fn run(
        sequencer: &mut StepSequencer,
        context: &mut TransactionContext,
        domain: Domain,
        step: Step,
    ) -> Result<(), StepError> {
        sequencer.validate_and_advance(context, domain, step, &full_params())?;
        context.record_step(domain, step, json!({ "step": step.as_str() }))
    }

    #[test]
    fn canonical_happy_path_reaches_status_checked() {
        let mut sequencer = StepSequencer::new();
        let mut context = TransactionContext::new();

        for step in Step::ALL {
            run(&mut sequencer, &mut context, Domain::Connection, step).expect("canonical order");
        }
        assert_eq!(sequencer.state(Domain::Connection), StepState::StatusChecked);

        run(&mut sequencer, &mut context, Domain::Connection, Step::Status).expect("status re-poll");
        assert_eq!(sequencer.state(Domain::Connection), StepState::StatusChecked);
    }

    #[test]
    fn every_skipped_step_is_rejected_naming_the_missing_predecessor() {
        for domain in Domain::ALL {
            for (index, step) in Step::ALL.iter().enumerate().skip(1) {
                let mut sequencer = StepSequencer::new();
                let mut context = TransactionContext::new();
                for earlier in &Step::ALL[..index - 1] {
                    run(&mut sequencer, &mut context, domain, *earlier).expect("prefix");
                }
                let history_before = context.history(domain).clone();
                let state_before = sequencer.state(domain);

                let error = run(&mut sequencer, &mut context, domain, *step)
                    .expect_err("skipping a step must fail");

                assert_eq!(
                    error,
                    StepError::OutOfSequence { domain, requested: *step, missing: Step::ALL[index - 1] }
                );
                assert_eq!(context.history(domain), &history_before);
                assert_eq!(sequencer.state(domain), state_before);
            }
        }
    }

    #[test]
    fn missing_parameters_are_checked_before_sequencing() {
        let sequencer = StepSequencer::new();
        let context = TransactionContext::new();

        let error = sequencer
            .validate(
                &context,
                Domain::Connection,
                Step::Confirm,
                &StepParams::new().with(params::PROVIDER_ID, "prov_1"),
            )
            .expect_err("confirm without params");

        assert_eq!(
            error,
            StepError::MissingParameter {
                domain: Domain::Connection,
                step: Step::Confirm,
                missing: vec![
                    "item_id".to_string(),
                    "fulfillment_id".to_string(),
                    "customer_name".to_string(),
                    "customer_phone".to_string(),
                    "customer_email".to_string(),
                ],
            }
        );
    }

    #[test]
    fn replaying_an_earlier_step_does_not_move_state_backward() {
        let mut sequencer = StepSequencer::new();
        let mut context = TransactionContext::new();
        for step in [Step::Search, Step::Select, Step::Init] {
            run(&mut sequencer, &mut context, Domain::SolarService, step).expect("prefix");
        }

        let approval = sequencer
            .validate_and_advance(&context, Domain::SolarService, Step::Select, &full_params())
            .expect("replay select");

        assert!(approval.replay);
        assert_eq!(sequencer.state(Domain::SolarService), StepState::Initialized);
    }

    #[test]
    fn state_without_history_is_not_enough() {
        let mut sequencer = StepSequencer::new();
        let context = TransactionContext::new();

        sequencer
            .validate_and_advance(&context, Domain::Subsidy, Step::Search, &StepParams::new())
            .expect("search is always allowed first");
        // search was approved but never recorded
        let error = sequencer
            .validate(&context, Domain::Subsidy, Step::Select, &full_params())
            .expect_err("select needs a recorded search");

        assert_eq!(
            error,
            StepError::OutOfSequence {
                domain: Domain::Subsidy,
                requested: Step::Select,
                missing: Step::Search,
            }
        );
    }

    #[test]
    fn validate_does_not_mutate_state() {
        let sequencer = StepSequencer::new();
        let context = TransactionContext::new();
        let approval = sequencer
            .validate(&context, Domain::Connection, Step::Search, &StepParams::new())
            .expect("search");

        assert_eq!(approval.to, StepState::Searched);
        assert_eq!(sequencer.state(Domain::Connection), StepState::NotStarted);
    }

    #[test]
    fn from_context_resumes_where_history_left_off() {
        let mut sequencer = StepSequencer::new();
        let mut context = TransactionContext::new();
        for step in [Step::Search, Step::Select] {
            run(&mut sequencer, &mut context, Domain::Connection, step).expect("prefix");
        }

        let resumed = StepSequencer::from_context(&context);
        assert_eq!(resumed, sequencer);
        assert_eq!(resumed.state(Domain::Connection), StepState::Selected);
        assert_eq!(resumed.state(Domain::Subsidy), StepState::NotStarted);
    }

    #[test]
    fn fresh_and_rebuilt_empty_sequencers_are_equal() {
        let mut sequencer = StepSequencer::from_context(&TransactionContext::new());
        assert_eq!(sequencer, StepSequencer::new());

        let mut context = TransactionContext::new();
        run(&mut sequencer, &mut context, Domain::Subsidy, Step::Search).expect("search");
        assert_ne!(sequencer, StepSequencer::new());

        sequencer.reset();
        assert_eq!(sequencer, StepSequencer::new());
    }

    #[test]
    fn validation_emits_audit_events() {
        let sequencer = StepSequencer::new();
        let context = TransactionContext::new();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(Some("session-1".to_owned()), "req-7", "step-sequencer");

        sequencer
            .validate_with_audit(&context, Domain::Connection, Step::Search, &StepParams::new(), &sink, &audit)
            .expect("search approved");
        let _ = sequencer.validate_with_audit(
            &context,
            Domain::Connection,
            Step::Init,
            &full_params(),
            &sink,
            &audit,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "sequencer.step_approved");
        assert_eq!(events[1].event_type, "sequencer.step_rejected");
        assert_eq!(events[1].metadata.get("error_class").map(String::as_str), Some("out_of_sequence"));
    }
}
